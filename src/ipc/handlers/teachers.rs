use crate::assign;
use crate::catalog;
use crate::ipc::error::{api_err, err, ok};
use crate::ipc::helpers::{i64_param, id_list_param};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::collections::HashSet;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teachers = match catalog::users(&state.api, &mut state.cache, Some("teacher")) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let subjects = match catalog::subjects(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };

    let rows: Vec<serde_json::Value> = teachers
        .iter()
        .map(|t| {
            let assigned: Vec<String> = t
                .assigned_subjects
                .iter()
                .filter_map(|a| a.get("subid").and_then(|v| v.as_i64()))
                .filter_map(|subid| subjects.iter().find(|s| s.subid == subid))
                .map(|s| match s.level.as_deref() {
                    Some(level) => format!("{} (Level: {})", s.subname, level),
                    None => s.subname.clone(),
                })
                .collect();
            json!({
                "userid": t.userid,
                "teachid": t.user_role_link,
                "username": t.username,
                "email": t.email,
                "assignedSubjects": t.assigned_subjects,
                "assignedDisplay": if assigned.is_empty() { "None".to_string() } else { assigned.join("; ") }
            })
        })
        .collect();
    let options: Vec<serde_json::Value> = teachers
        .iter()
        .map(|t| json!({ "id": t.userid, "label": format!("{} (ID: {})", t.username, t.userid) }))
        .collect();
    ok(&req.id, json!({ "teachers": rows, "options": options }))
}

/// Subjects offered for assignment: only those with a level defined, sorted
/// by display label.
fn handle_subject_options(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subjects = match catalog::subjects(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let mut options: Vec<serde_json::Value> = subjects
        .iter()
        .filter_map(|s| {
            s.level.as_deref().map(|level| {
                json!({
                    "id": s.subid,
                    "label": format!("{} (Level: {}, ID: {})", s.subname, level, s.subid)
                })
            })
        })
        .collect();
    options.sort_by(|a, b| a["label"].as_str().cmp(&b["label"].as_str()));
    ok(&req.id, json!({ "subjects": options }))
}

/// Replace ALL of the teacher's subject assignments with the given set. The
/// backend drops existing links, inserts the new ones, and sets isapprover to
/// false on every inserted row.
fn handle_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(userid) = i64_param(&req.params, "userid") else {
        return err(&req.id, "bad_params", "missing userid", None);
    };
    let subject_ids = match id_list_param(&req.params, "subjectIds") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let teachers = match catalog::users(&state.api, &mut state.cache, Some("teacher")) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let Some(teacher) = teachers.iter().find(|t| t.userid == userid) else {
        return err(&req.id, "not_found", "teacher user not found", None);
    };
    if teacher.user_role_link.is_none() {
        return err(
            &req.id,
            "missing_role_link",
            format!("user '{}' has no teacher record linked", teacher.username),
            None,
        );
    }

    let subjects = match catalog::subjects(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let known: HashSet<i64> = subjects.iter().map(|s| s.subid).collect();
    let desired = assign::desired_set(&subject_ids);
    if let Some(unknown) = desired.iter().find(|id| !known.contains(id)) {
        return err(
            &req.id,
            "bad_params",
            format!("unknown subject id {unknown}"),
            None,
        );
    }

    let resp = state
        .api
        .put(&format!("/users/{userid}"), &assign::subjects_payload(&desired));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "user": resp.body }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(handle_list(state, req)),
        "teachers.subjectOptions" => Some(handle_subject_options(state, req)),
        "teachers.assign" => Some(handle_assign(state, req)),
        _ => None,
    }
}
