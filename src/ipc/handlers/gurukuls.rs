use crate::catalog;
use crate::guard;
use crate::ipc::error::{api_err, err, ok};
use crate::ipc::helpers::{i64_param, str_param};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::collections::HashSet;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let gurukuls = match catalog::gurukuls(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let options: Vec<serde_json::Value> = gurukuls
        .iter()
        .map(|g| json!({ "id": g.gid, "label": format!("{} (ID: {})", g.gname, g.gid) }))
        .collect();
    ok(&req.id, json!({ "gurukuls": gurukuls, "options": options }))
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(gname) = str_param(&req.params, "gname") else {
        return err(&req.id, "bad_params", "missing gname", None);
    };

    let gurukuls = match catalog::gurukuls(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let names: HashSet<String> = gurukuls.iter().map(|g| g.gname.clone()).collect();
    if !guard::value_is_free(&gname, &names, None) {
        return err(
            &req.id,
            "duplicate",
            format!("Gurukul '{gname}' already exists."),
            None,
        );
    }

    let resp = state.api.post("/gurukul", &json!({ "gname": gname }));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "gurukul": resp.body }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(gid) = i64_param(&req.params, "gid") else {
        return err(&req.id, "bad_params", "missing gid", None);
    };
    let Some(gname) = str_param(&req.params, "gname") else {
        return err(&req.id, "bad_params", "missing gname", None);
    };

    let gurukuls = match catalog::gurukuls(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let Some(current) = gurukuls.iter().find(|g| g.gid == gid) else {
        return err(&req.id, "not_found", "gurukul not found", None);
    };
    let names: HashSet<String> = gurukuls.iter().map(|g| g.gname.clone()).collect();
    if !guard::value_is_free(&gname, &names, Some(&current.gname)) {
        return err(
            &req.id,
            "duplicate",
            format!("Gurukul '{gname}' already exists."),
            None,
        );
    }

    let resp = state
        .api
        .put(&format!("/gurukul/{gid}"), &json!({ "gname": gname }));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "gurukul": resp.body }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(gid) = i64_param(&req.params, "gid") else {
        return err(&req.id, "bad_params", "missing gid", None);
    };

    // The backend cascades the delete to the gurukul's offerings.
    let resp = state.api.delete(&format!("/gurukul/{gid}"));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "deleted": gid }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "gurukuls.list" => Some(handle_list(state, req)),
        "gurukuls.create" => Some(handle_create(state, req)),
        "gurukuls.update" => Some(handle_update(state, req)),
        "gurukuls.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
