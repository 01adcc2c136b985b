use crate::catalog;
use crate::guard;
use crate::ipc::error::{api_err, err, ok};
use crate::ipc::helpers::{i64_param, raw_str_param, str_param};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::collections::HashSet;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subtopics = match catalog::subtopics(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    ok(&req.id, json!({ "subtopics": subtopics }))
}

/// Topic dropdowns for this page: all topics for the create section, and only
/// topics that already have subtopics for the list/update sections.
fn handle_topics(state: &mut AppState, req: &Request) -> serde_json::Value {
    let topics = match catalog::topics(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let subtopics = match catalog::subtopics(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let with_subtopics: HashSet<i64> = subtopics.iter().map(|s| s.topic_id).collect();

    let mut all: Vec<serde_json::Value> = topics
        .iter()
        .map(|t| json!({ "id": t.tid, "label": format!("{} (ID: {})", t.tname, t.tid) }))
        .collect();
    all.sort_by(|a, b| a["label"].as_str().cmp(&b["label"].as_str()));
    let filtered: Vec<serde_json::Value> = all
        .iter()
        .filter(|o| {
            o["id"]
                .as_i64()
                .is_some_and(|tid| with_subtopics.contains(&tid))
        })
        .cloned()
        .collect();
    ok(&req.id, json!({ "all": all, "withSubtopics": filtered }))
}

fn handle_by_topic(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(topic_id) = i64_param(&req.params, "topicId") else {
        return err(&req.id, "bad_params", "missing topicId", None);
    };
    let subtopics = match catalog::subtopics_by_topic(&state.api, &mut state.cache, topic_id) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let options: Vec<serde_json::Value> = subtopics
        .iter()
        .map(|s| json!({ "id": s.subtid, "label": format!("ID: {} ({})", s.subtid, s.subtopic_name) }))
        .collect();
    ok(&req.id, json!({ "subtopics": subtopics, "options": options }))
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(topic_id) = i64_param(&req.params, "topicId") else {
        return err(&req.id, "bad_params", "missing topicId", None);
    };
    let Some(name) = str_param(&req.params, "subtopicName") else {
        return err(&req.id, "bad_params", "missing subtopicName", None);
    };

    let topics = match catalog::topics(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    if !topics.iter().any(|t| t.tid == topic_id) {
        return err(&req.id, "bad_params", "unknown parent topic", None);
    }
    let siblings = match catalog::subtopics_by_topic(&state.api, &mut state.cache, topic_id) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let names: HashSet<String> = siblings.iter().map(|s| s.subtopic_name.clone()).collect();
    if !guard::value_is_free(&name, &names, None) {
        return err(
            &req.id,
            "duplicate",
            format!("Subtopic '{name}' already exists in this topic."),
            None,
        );
    }

    let image_url = raw_str_param(&req.params, "imageUrl").unwrap_or_default();
    let resp = state.api.post(
        "/subtopics",
        &json!({ "topicId": topic_id, "subtopicName": name, "imageUrl": image_url }),
    );
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "subtopic": resp.body }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(subtid) = i64_param(&req.params, "subtid") else {
        return err(&req.id, "bad_params", "missing subtid", None);
    };
    let Some(topic_id) = i64_param(&req.params, "topicId") else {
        return err(&req.id, "bad_params", "missing topicId", None);
    };

    let siblings = match catalog::subtopics_by_topic(&state.api, &mut state.cache, topic_id) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let Some(current) = siblings.iter().find(|s| s.subtid == subtid).cloned() else {
        return err(&req.id, "not_found", "subtopic not found", None);
    };

    let mut payload = serde_json::Map::new();
    if let Some(name) = str_param(&req.params, "subtopicName") {
        if name != current.subtopic_name {
            let names: HashSet<String> = siblings
                .iter()
                .filter(|s| s.subtid != subtid)
                .map(|s| s.subtopic_name.clone())
                .collect();
            if !guard::value_is_free(&name, &names, Some(&current.subtopic_name)) {
                return err(
                    &req.id,
                    "duplicate",
                    format!("Subtopic '{name}' already exists in this topic."),
                    None,
                );
            }
            payload.insert("subtopicName".into(), json!(name));
        }
    }
    if let Some(image_url) = raw_str_param(&req.params, "imageUrl") {
        if current.image_url.as_deref().unwrap_or("") != image_url {
            payload.insert("imageUrl".into(), json!(image_url));
        }
    }

    if payload.is_empty() {
        return ok(&req.id, json!({ "changed": false }));
    }

    let resp = state
        .api
        .put(&format!("/subtopics/{subtid}"), &serde_json::Value::Object(payload));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "subtopic": resp.body, "changed": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subtopics.list" => Some(handle_list(state, req)),
        "subtopics.topics" => Some(handle_topics(state, req)),
        "subtopics.byTopic" => Some(handle_by_topic(state, req)),
        "subtopics.create" => Some(handle_create(state, req)),
        "subtopics.update" => Some(handle_update(state, req)),
        _ => None,
    }
}
