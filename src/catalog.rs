use crate::api::{ApiClient, ApiResponse};
use crate::cache::ListCache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

pub const ALL_GTYPES: [&str; 4] = ["G1", "G2", "G3", "G4"];

/// Fixed G-type → level domain table. Must stay consistent with the backend.
pub fn levels_for_gtype(gtype: &str) -> &'static [&'static str] {
    match gtype {
        "G1" => &["L1", "L2", "L3", "L4"],
        "G2" => &["L5", "L6", "L7", "L8"],
        "G3" => &["L9", "L10", "L11", "L12"],
        "G4" => &["L13", "L14", "L15", "L16"],
        _ => &[],
    }
}

/// Every level any G-type can carry, sorted the way the backend sorts level
/// strings (lexicographic, so L10 lands before L2).
pub fn all_levels() -> Vec<&'static str> {
    let mut levels: Vec<&'static str> = ALL_GTYPES
        .iter()
        .flat_map(|gt| levels_for_gtype(gt).iter().copied())
        .collect();
    levels.sort_unstable();
    levels
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gurukul {
    pub gid: i64,
    pub gname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offering {
    pub oid: i64,
    pub gid: i64,
    pub gtype: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub mid: i64,
    pub class: i64,
    pub level: String,
    pub oid: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub subid: i64,
    pub subname: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub tid: i64,
    pub tname: String,
    pub subid: i64,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtopic {
    pub subtid: i64,
    pub topic_id: i64,
    pub subtopic_name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Account row from `public.users`, with the role-specific assignment blobs
/// the backend attaches. Assignment entries are passed through as raw JSON;
/// only the ids are interpreted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub userid: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub isdeleted: bool,
    #[serde(default)]
    pub user_role_link: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub assigned_subjects: Vec<Value>,
    #[serde(default)]
    pub assigned_gurukuls: Vec<Value>,
    #[serde(default)]
    pub assigned_milestones: Vec<Value>,
}

/// Row from the legacy `/students` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectStudent {
    pub sid: i64,
    pub sname: String,
    pub email: String,
    #[serde(default, rename = "gurukulId")]
    pub gurukul_id: Option<i64>,
    #[serde(default, rename = "milestoneId")]
    pub milestone_id: Option<i64>,
    #[serde(default)]
    pub assigned_gurukuls: Vec<Value>,
    #[serde(default)]
    pub assigned_milestones: Vec<Value>,
}

/// Row from the legacy `/teachers` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectTeacher {
    pub teachid: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subjects: Vec<Value>,
}

fn fetch_list<T: DeserializeOwned>(
    api: &ApiClient,
    cache: &mut ListCache,
    key: &str,
    endpoint: &str,
) -> Result<Vec<T>, ApiResponse> {
    let value = match cache.get(key) {
        Some(v) => v,
        None => {
            let resp = api.get(endpoint);
            if !resp.is_success() {
                return Err(resp);
            }
            cache.put(key, resp.body.clone());
            resp.body
        }
    };
    serde_json::from_value(value).map_err(|e| ApiResponse {
        status: 500,
        body: json!({ "message": format!("Unexpected {key} payload: {e}") }),
    })
}

pub fn gurukuls(api: &ApiClient, cache: &mut ListCache) -> Result<Vec<Gurukul>, ApiResponse> {
    fetch_list(api, cache, "gurukuls", "/gurukul")
}

pub fn offerings(api: &ApiClient, cache: &mut ListCache) -> Result<Vec<Offering>, ApiResponse> {
    fetch_list(api, cache, "offerings", "/gurukul-offerings")
}

pub fn milestones(api: &ApiClient, cache: &mut ListCache) -> Result<Vec<Milestone>, ApiResponse> {
    fetch_list(api, cache, "milestones", "/milestones")
}

pub fn milestones_by_gurukul(
    api: &ApiClient,
    cache: &mut ListCache,
    gid: i64,
) -> Result<Vec<Milestone>, ApiResponse> {
    let key = format!("milestones.by-gurukul.{gid}");
    let endpoint = format!("/milestones/by-gurukul/{gid}");
    fetch_list(api, cache, &key, &endpoint)
}

pub fn distinct_milestone_levels(
    api: &ApiClient,
    cache: &mut ListCache,
) -> Result<Vec<String>, ApiResponse> {
    fetch_list(api, cache, "milestones.distinct-levels", "/milestones/distinct-levels")
}

pub fn subjects(api: &ApiClient, cache: &mut ListCache) -> Result<Vec<Subject>, ApiResponse> {
    fetch_list(api, cache, "subjects", "/subjects")
}

pub fn topics(api: &ApiClient, cache: &mut ListCache) -> Result<Vec<Topic>, ApiResponse> {
    fetch_list(api, cache, "topics", "/topics")
}

pub fn subtopics(api: &ApiClient, cache: &mut ListCache) -> Result<Vec<Subtopic>, ApiResponse> {
    fetch_list(api, cache, "subtopics", "/subtopics")
}

pub fn subtopics_by_topic(
    api: &ApiClient,
    cache: &mut ListCache,
    topic_id: i64,
) -> Result<Vec<Subtopic>, ApiResponse> {
    let key = format!("subtopics.by-topic.{topic_id}");
    let endpoint = format!("/subtopics/by-topic/{topic_id}");
    fetch_list(api, cache, &key, &endpoint)
}

pub fn users(
    api: &ApiClient,
    cache: &mut ListCache,
    role: Option<&str>,
) -> Result<Vec<User>, ApiResponse> {
    match role {
        Some(role) => {
            let key = format!("users.role.{role}");
            let endpoint = format!("/users?role={role}");
            fetch_list(api, cache, &key, &endpoint)
        }
        None => fetch_list(api, cache, "users", "/users"),
    }
}

pub fn direct_students(
    api: &ApiClient,
    cache: &mut ListCache,
) -> Result<Vec<DirectStudent>, ApiResponse> {
    fetch_list(api, cache, "students.direct", "/students")
}

pub fn direct_teachers(
    api: &ApiClient,
    cache: &mut ListCache,
) -> Result<Vec<DirectTeacher>, ApiResponse> {
    fetch_list(api, cache, "teachers.direct", "/teachers")
}

// ---- derived lookups shared by the page handlers ----

pub fn gurukul_name_map(gurukuls: &[Gurukul]) -> HashMap<i64, String> {
    gurukuls
        .iter()
        .map(|g| (g.gid, g.gname.clone()))
        .collect()
}

pub fn gtypes_by_gurukul(offerings: &[Offering]) -> HashMap<i64, HashSet<String>> {
    let mut map: HashMap<i64, HashSet<String>> = HashMap::new();
    for o in offerings {
        map.entry(o.gid).or_default().insert(o.gtype.clone());
    }
    map
}

/// Gurukuls that still have at least one G-type free, sorted by name.
pub fn creatable_gurukuls<'a>(
    gurukuls: &'a [Gurukul],
    offerings: &[Offering],
) -> Vec<&'a Gurukul> {
    let existing = gtypes_by_gurukul(offerings);
    let mut out: Vec<&Gurukul> = gurukuls
        .iter()
        .filter(|g| {
            let taken = existing.get(&g.gid);
            !ALL_GTYPES
                .iter()
                .all(|gt| taken.is_some_and(|set| set.contains(*gt)))
        })
        .collect();
    out.sort_by(|a, b| a.gname.cmp(&b.gname));
    out
}

/// G-types not yet offered by the given gurukul, sorted.
pub fn free_gtypes(offerings: &[Offering], gid: i64) -> Vec<&'static str> {
    let taken: HashSet<&str> = offerings
        .iter()
        .filter(|o| o.gid == gid)
        .map(|o| o.gtype.as_str())
        .collect();
    ALL_GTYPES
        .iter()
        .copied()
        .filter(|gt| !taken.contains(gt))
        .collect()
}

/// Levels the given offering may still take: its G-type's domain minus the
/// levels already consumed by sibling milestones under the same offering.
/// `exclude_mid` keeps a milestone's own level available during update.
pub fn available_levels(
    offering: &Offering,
    milestones: &[Milestone],
    exclude_mid: Option<i64>,
) -> Vec<&'static str> {
    let taken: HashSet<&str> = milestones
        .iter()
        .filter(|m| m.oid == offering.oid && Some(m.mid) != exclude_mid)
        .map(|m| m.level.as_str())
        .collect();
    levels_for_gtype(&offering.gtype)
        .iter()
        .copied()
        .filter(|lvl| !taken.contains(lvl))
        .collect()
}

/// Gurukuls reachable from at least one milestone (via its offering). Only
/// these are offered when placing a student.
pub fn gurukuls_with_milestones<'a>(
    gurukuls: &'a [Gurukul],
    offerings: &[Offering],
    milestones: &[Milestone],
) -> Vec<&'a Gurukul> {
    let offering_to_gid: HashMap<i64, i64> = offerings.iter().map(|o| (o.oid, o.gid)).collect();
    let gids: HashSet<i64> = milestones
        .iter()
        .filter_map(|m| offering_to_gid.get(&m.oid).copied())
        .collect();
    gurukuls.iter().filter(|g| gids.contains(&g.gid)).collect()
}
