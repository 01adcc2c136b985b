use crate::catalog;
use crate::ipc::error::{api_err, ok};
use crate::ipc::helpers::{i64_param, str_param};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn topic_row(t: &catalog::Topic) -> serde_json::Value {
    json!({
        "tid": t.tid,
        "tname": t.tname,
        "imageUrl": t.image_url.clone().unwrap_or_default()
    })
}

/// Read-only page: pick a subject, see its topics. A vanished subject id
/// degrades to an empty topic list rather than an error.
fn handle_topics_by_subject(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subjects = match catalog::subjects(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let topics = match catalog::topics(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };

    let subject_options: Vec<serde_json::Value> = subjects
        .iter()
        .map(|s| json!({ "id": s.subid, "label": format!("{} (ID: {})", s.subname, s.subid) }))
        .collect();

    let selected = i64_param(&req.params, "subid");
    let selected_subject = selected.and_then(|subid| subjects.iter().find(|s| s.subid == subid));
    let rows: Vec<serde_json::Value> = match selected {
        Some(subid) => topics
            .iter()
            .filter(|t| t.subid == subid)
            .map(topic_row)
            .collect(),
        None => Vec::new(),
    };

    ok(
        &req.id,
        json!({
            "subjects": subject_options,
            "selectedSubject": selected_subject,
            "topics": rows
        }),
    )
}

/// Read-only page: level → subjects at that level → topics of the chosen
/// subject. Levels are whatever subjects actually carry.
fn handle_topics_by_level(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subjects = match catalog::subjects(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let topics = match catalog::topics(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };

    let levels: Vec<String> = subjects
        .iter()
        .filter_map(|s| s.level.clone())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let level = str_param(&req.params, "level");
    let subjects_at_level: Vec<&catalog::Subject> = match level.as_deref() {
        Some(level) => subjects
            .iter()
            .filter(|s| s.level.as_deref() == Some(level))
            .collect(),
        None => Vec::new(),
    };
    let subject_options: Vec<serde_json::Value> = subjects_at_level
        .iter()
        .map(|s| json!({ "id": s.subid, "label": format!("{} (ID: {})", s.subname, s.subid) }))
        .collect();

    // Topics only resolve when the chosen subject really sits at the chosen level.
    let selected = i64_param(&req.params, "subid")
        .filter(|subid| subjects_at_level.iter().any(|s| s.subid == *subid));
    let rows: Vec<serde_json::Value> = match selected {
        Some(subid) => topics
            .iter()
            .filter(|t| t.subid == subid)
            .map(topic_row)
            .collect(),
        None => Vec::new(),
    };

    ok(
        &req.id,
        json!({
            "levels": levels,
            "subjects": subject_options,
            "topics": rows
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "views.topicsBySubject" => Some(handle_topics_by_subject(state, req)),
        "views.topicsByLevel" => Some(handle_topics_by_level(state, req)),
        _ => None,
    }
}
