use crate::catalog;
use crate::guard;
use crate::ipc::error::{api_err, err, ok};
use crate::ipc::helpers::{i64_param, raw_str_param, str_param};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::collections::HashSet;

fn subject_display(subject: Option<&catalog::Subject>, subid: i64) -> String {
    match subject {
        Some(s) => format!(
            "{} (Level: {}, ID: {})",
            s.subname,
            s.level.as_deref().unwrap_or("N/A"),
            s.subid
        ),
        None => format!("N/A Subject (ID: {subid})"),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let topics = match catalog::topics(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let subjects = match catalog::subjects(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };

    let rows: Vec<serde_json::Value> = topics
        .iter()
        .map(|t| {
            let subject = subjects.iter().find(|s| s.subid == t.subid);
            json!({
                "tid": t.tid,
                "tname": t.tname,
                "subid": t.subid,
                "subjectInfo": subject_display(subject, t.subid),
                "imageUrl": t.image_url.clone().unwrap_or_default()
            })
        })
        .collect();
    let subject_options: Vec<serde_json::Value> = subjects
        .iter()
        .map(|s| json!({ "id": s.subid, "label": subject_display(Some(s), s.subid) }))
        .collect();
    ok(
        &req.id,
        json!({ "topics": rows, "subjectOptions": subject_options }),
    )
}

fn sibling_names(topics: &[catalog::Topic], subid: i64, exclude_tid: Option<i64>) -> HashSet<String> {
    topics
        .iter()
        .filter(|t| t.subid == subid && Some(t.tid) != exclude_tid)
        .map(|t| t.tname.clone())
        .collect()
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(tname) = str_param(&req.params, "tname") else {
        return err(&req.id, "bad_params", "missing tname", None);
    };
    let Some(subid) = i64_param(&req.params, "subid") else {
        return err(&req.id, "bad_params", "missing subid", None);
    };

    let subjects = match catalog::subjects(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    if !subjects.iter().any(|s| s.subid == subid) {
        return err(&req.id, "bad_params", "unknown parent subject", None);
    }
    let topics = match catalog::topics(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    if !guard::value_is_free(&tname, &sibling_names(&topics, subid, None), None) {
        return err(
            &req.id,
            "duplicate",
            format!("Topic '{tname}' already exists for this subject."),
            None,
        );
    }

    let mut payload = json!({ "tname": tname, "subid": subid });
    if let Some(image_url) = str_param(&req.params, "imageUrl") {
        payload["image_url"] = json!(image_url);
    }
    let resp = state.api.post("/topics", &payload);
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "topic": resp.body }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(tid) = i64_param(&req.params, "tid") else {
        return err(&req.id, "bad_params", "missing tid", None);
    };

    let topics = match catalog::topics(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let Some(current) = topics.iter().find(|t| t.tid == tid).cloned() else {
        return err(&req.id, "not_found", "topic not found", None);
    };

    let target_subid = i64_param(&req.params, "subid").unwrap_or(current.subid);
    let target_tname = str_param(&req.params, "tname").unwrap_or_else(|| current.tname.clone());

    if target_subid != current.subid {
        let subjects = match catalog::subjects(&state.api, &mut state.cache) {
            Ok(v) => v,
            Err(resp) => return api_err(&req.id, &resp),
        };
        if !subjects.iter().any(|s| s.subid == target_subid) {
            return err(&req.id, "bad_params", "unknown parent subject", None);
        }
    }
    // Renames and re-parenting both land in the target subject's sibling set.
    if !guard::value_is_free(
        &target_tname,
        &sibling_names(&topics, target_subid, Some(tid)),
        None,
    ) {
        return err(
            &req.id,
            "duplicate",
            format!("Topic '{target_tname}' already exists for this subject."),
            None,
        );
    }

    let mut payload = serde_json::Map::new();
    if target_tname != current.tname {
        payload.insert("tname".into(), json!(target_tname));
    }
    if target_subid != current.subid {
        payload.insert("subid".into(), json!(target_subid));
    }
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
        .put(&format!("/topics/{tid}"), &serde_json::Value::Object(payload));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "topic": resp.body, "changed": true }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(tid) = i64_param(&req.params, "tid") else {
        return err(&req.id, "bad_params", "missing tid", None);
    };
    let resp = state.api.delete(&format!("/topics/{tid}"));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "deleted": tid }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "topics.list" => Some(handle_list(state, req)),
        "topics.create" => Some(handle_create(state, req)),
        "topics.update" => Some(handle_update(state, req)),
        "topics.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
