use crate::catalog::{self, ALL_GTYPES};
use crate::guard;
use crate::ipc::error::{api_err, err, ok};
use crate::ipc::helpers::{i64_param, str_param};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::collections::HashSet;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let offerings = match catalog::offerings(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let gurukuls = match catalog::gurukuls(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let names = catalog::gurukul_name_map(&gurukuls);

    let mut rows: Vec<serde_json::Value> = offerings
        .iter()
        .map(|o| {
            let gurukul_name = names.get(&o.gid).cloned().unwrap_or_else(|| "N/A".into());
            json!({
                "oid": o.oid,
                "gid": o.gid,
                "gtype": o.gtype,
                "gurukulName": gurukul_name
            })
        })
        .collect();
    rows.sort_by_key(|r| r.get("oid").and_then(|v| v.as_i64()));

    let options: Vec<serde_json::Value> = rows
        .iter()
        .map(|r| {
            json!({
                "id": r["oid"],
                "label": format!(
                    "ID: {} ({} for {})",
                    r["oid"],
                    r["gtype"].as_str().unwrap_or(""),
                    r["gurukulName"].as_str().unwrap_or("N/A")
                )
            })
        })
        .collect();
    ok(&req.id, json!({ "offerings": rows, "options": options }))
}

/// Gurukuls that can still take a new offering (at least one G-type free).
fn handle_creatable(state: &mut AppState, req: &Request) -> serde_json::Value {
    let gurukuls = match catalog::gurukuls(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let offerings = match catalog::offerings(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let options: Vec<serde_json::Value> = catalog::creatable_gurukuls(&gurukuls, &offerings)
        .iter()
        .map(|g| json!({ "id": g.gid, "label": format!("{} (ID: {})", g.gname, g.gid) }))
        .collect();
    ok(&req.id, json!({ "gurukuls": options }))
}

fn handle_gtype_options(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(gid) = i64_param(&req.params, "gid") else {
        return err(&req.id, "bad_params", "missing gid", None);
    };
    let offerings = match catalog::offerings(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    ok(&req.id, json!({ "gtypes": catalog::free_gtypes(&offerings, gid) }))
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(gid) = i64_param(&req.params, "gid") else {
        return err(&req.id, "bad_params", "missing gid", None);
    };
    let Some(gtype) = str_param(&req.params, "gtype") else {
        return err(&req.id, "bad_params", "missing gtype", None);
    };
    if !ALL_GTYPES.contains(&gtype.as_str()) {
        return err(&req.id, "bad_params", format!("invalid gtype '{gtype}'"), None);
    }

    let gurukuls = match catalog::gurukuls(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    if !gurukuls.iter().any(|g| g.gid == gid) {
        return err(&req.id, "bad_params", "unknown parent gurukul", None);
    }
    let offerings = match catalog::offerings(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let siblings: HashSet<String> = offerings
        .iter()
        .filter(|o| o.gid == gid)
        .map(|o| o.gtype.clone())
        .collect();
    if !guard::value_is_free(&gtype, &siblings, None) {
        return err(
            &req.id,
            "duplicate",
            format!("Gurukul {gid} already has a {gtype} offering."),
            None,
        );
    }

    let resp = state
        .api
        .post("/gurukul-offerings", &json!({ "gid": gid, "gtype": gtype }));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "offering": resp.body }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(oid) = i64_param(&req.params, "oid") else {
        return err(&req.id, "bad_params", "missing oid", None);
    };
    let Some(gid) = i64_param(&req.params, "gid") else {
        return err(&req.id, "bad_params", "missing gid", None);
    };
    let Some(gtype) = str_param(&req.params, "gtype") else {
        return err(&req.id, "bad_params", "missing gtype", None);
    };
    if !ALL_GTYPES.contains(&gtype.as_str()) {
        return err(&req.id, "bad_params", format!("invalid gtype '{gtype}'"), None);
    }

    let offerings = match catalog::offerings(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    if !offerings.iter().any(|o| o.oid == oid) {
        return err(&req.id, "not_found", "offering not found", None);
    }
    // Siblings under the target gurukul, with this offering itself excluded so
    // keeping the pair is a no-op rather than a conflict.
    let siblings: HashSet<String> = offerings
        .iter()
        .filter(|o| o.gid == gid && o.oid != oid)
        .map(|o| o.gtype.clone())
        .collect();
    if !guard::value_is_free(&gtype, &siblings, None) {
        return err(
            &req.id,
            "duplicate",
            format!("Gurukul {gid} already has a {gtype} offering."),
            None,
        );
    }

    let resp = state.api.put(
        &format!("/gurukul-offerings/{oid}"),
        &json!({ "gid": gid, "gtype": gtype }),
    );
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "offering": resp.body }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(oid) = i64_param(&req.params, "oid") else {
        return err(&req.id, "bad_params", "missing oid", None);
    };
    let resp = state.api.delete(&format!("/gurukul-offerings/{oid}"));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "deleted": oid }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "offerings.list" => Some(handle_list(state, req)),
        "offerings.creatable" => Some(handle_creatable(state, req)),
        "offerings.gtypeOptions" => Some(handle_gtype_options(state, req)),
        "offerings.create" => Some(handle_create(state, req)),
        "offerings.update" => Some(handle_update(state, req)),
        "offerings.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
