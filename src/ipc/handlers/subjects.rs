use crate::catalog;
use crate::ipc::error::{api_err, err, ok};
use crate::ipc::helpers::{i64_param, raw_str_param, str_param};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::collections::HashSet;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut subjects = match catalog::subjects(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    subjects.sort_by_key(|s| s.subid);
    let options: Vec<serde_json::Value> = subjects
        .iter()
        .map(|s| {
            let level = s.level.as_deref().unwrap_or("N/A");
            json!({ "id": s.subid, "label": format!("ID: {} ({} - {})", s.subid, s.subname, level) })
        })
        .collect();
    ok(&req.id, json!({ "subjects": subjects, "options": options }))
}

/// Levels a subject may use: the fixed L1..L16 domain restricted to levels
/// that actually exist in the milestones table.
fn level_options(state: &mut AppState) -> Result<Vec<String>, crate::api::ApiResponse> {
    let existing = catalog::distinct_milestone_levels(&state.api, &mut state.cache)?;
    let existing: HashSet<&str> = existing.iter().map(String::as_str).collect();
    let mut levels: Vec<String> = catalog::all_levels()
        .into_iter()
        .filter(|lvl| existing.contains(lvl))
        .map(String::from)
        .collect();
    levels.sort();
    Ok(levels)
}

fn handle_level_options(state: &mut AppState, req: &Request) -> serde_json::Value {
    match level_options(state) {
        Ok(levels) => ok(&req.id, json!({ "levels": levels })),
        Err(resp) => api_err(&req.id, &resp),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(subname) = str_param(&req.params, "subname") else {
        return err(&req.id, "bad_params", "missing subname", None);
    };
    let Some(level) = str_param(&req.params, "level") else {
        return err(&req.id, "bad_params", "missing level", None);
    };
    let available = match level_options(state) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    if !available.contains(&level) {
        return err(
            &req.id,
            "bad_params",
            format!("level {level} has no milestones yet"),
            None,
        );
    }

    let mut payload = json!({ "subname": subname, "level": level });
    if let Some(image_url) = str_param(&req.params, "imageUrl") {
        payload["image_url"] = json!(image_url);
    }
    let resp = state.api.post("/subjects", &payload);
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "subject": resp.body }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(subid) = i64_param(&req.params, "subid") else {
        return err(&req.id, "bad_params", "missing subid", None);
    };

    let subjects = match catalog::subjects(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let Some(current) = subjects.iter().find(|s| s.subid == subid).cloned() else {
        return err(&req.id, "not_found", "subject not found", None);
    };

    let mut payload = serde_json::Map::new();
    if let Some(subname) = str_param(&req.params, "subname") {
        if subname != current.subname {
            payload.insert("subname".into(), json!(subname));
        }
    }
    if let Some(level) = str_param(&req.params, "level") {
        if current.level.as_deref() != Some(level.as_str()) {
            let available = match level_options(state) {
                Ok(v) => v,
                Err(resp) => return api_err(&req.id, &resp),
            };
            if !available.contains(&level) {
                return err(
                    &req.id,
                    "bad_params",
                    format!("level {level} has no milestones yet"),
                    None,
                );
            }
            payload.insert("level".into(), json!(level));
        }
    }
    // Empty string clears the image; absent leaves it alone.
    if let Some(image_url) = raw_str_param(&req.params, "imageUrl") {
        if current.image_url.as_deref().unwrap_or("") != image_url {
            payload.insert("image_url".into(), json!(image_url));
        }
    }

    if payload.is_empty() {
        return ok(&req.id, json!({ "changed": false }));
    }

    let resp = state
        .api
        .put(&format!("/subjects/{subid}"), &serde_json::Value::Object(payload));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "subject": resp.body, "changed": true }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(subid) = i64_param(&req.params, "subid") else {
        return err(&req.id, "bad_params", "missing subid", None);
    };
    // The backend cascades the delete to the subject's topics.
    let resp = state.api.delete(&format!("/subjects/{subid}"));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "deleted": subid }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_list(state, req)),
        "subjects.levelOptions" => Some(handle_level_options(state, req)),
        "subjects.create" => Some(handle_create(state, req)),
        "subjects.update" => Some(handle_update(state, req)),
        "subjects.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
