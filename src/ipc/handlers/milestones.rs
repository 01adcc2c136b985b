use crate::catalog;
use crate::guard;
use crate::ipc::error::{api_err, err, ok};
use crate::ipc::helpers::{i64_param, opt_id_param, str_param};
use crate::ipc::types::{AppState, Request};
use crate::selection::{ChainItem, SelectorChain};
use serde_json::json;
use std::collections::HashSet;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let milestones = match catalog::milestones(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let offerings = match catalog::offerings(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let gurukuls = match catalog::gurukuls(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let names = catalog::gurukul_name_map(&gurukuls);

    let mut rows: Vec<serde_json::Value> = milestones
        .iter()
        .map(|m| {
            let offering = offerings.iter().find(|o| o.oid == m.oid);
            let offering_type = offering.map(|o| o.gtype.clone()).unwrap_or_else(|| "N/A".into());
            let gurukul_name = offering
                .and_then(|o| names.get(&o.gid).cloned())
                .unwrap_or_else(|| "N/A".into());
            json!({
                "mid": m.mid,
                "class": m.class,
                "level": m.level,
                "oid": m.oid,
                "offeringType": offering_type,
                "gurukulName": gurukul_name
            })
        })
        .collect();
    rows.sort_by_key(|r| r.get("mid").and_then(|v| v.as_i64()));

    let options: Vec<serde_json::Value> = milestones
        .iter()
        .map(|m| json!({ "id": m.mid, "label": format!("ID: {} (Level: {})", m.mid, m.level) }))
        .collect();
    ok(&req.id, json!({ "milestones": rows, "options": options }))
}

/// Gurukul → offering selection for the create/update sections. Reloading the
/// snapshot before applying the new selection means a stale pick collapses to
/// "none selected" instead of surviving a refetch.
fn handle_chain_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(scope) = str_param(&req.params, "scope") else {
        return err(&req.id, "bad_params", "missing scope", None);
    };
    if scope != "create" && scope != "update" {
        return err(&req.id, "bad_params", format!("unknown scope '{scope}'"), None);
    }
    let Some(level) = i64_param(&req.params, "level") else {
        return err(&req.id, "bad_params", "missing level", None);
    };
    if !(0..=1).contains(&level) {
        return err(&req.id, "bad_params", "level out of range", None);
    }
    let id = match opt_id_param(&req.params, "id") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let gurukuls = match catalog::gurukuls(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let offerings = match catalog::offerings(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let milestones = match catalog::milestones(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };

    let snapshot = vec![
        gurukuls
            .iter()
            .map(|g| ChainItem::root(g.gid, format!("{} (ID: {})", g.gname, g.gid)))
            .collect(),
        offerings
            .iter()
            .map(|o| ChainItem::child(o.oid, o.gid, format!("OID: {} (Type: {})", o.oid, o.gtype)))
            .collect(),
    ];
    let chain = state
        .chains
        .entry(format!("milestones.{scope}"))
        .or_insert_with(|| SelectorChain::new(2));
    chain.reload(snapshot);
    chain.set_selection(level as usize, id);

    let selected_offering = chain
        .selection(1)
        .and_then(|oid| offerings.iter().find(|o| o.oid == oid));
    let levels: Vec<&str> = selected_offering
        .map(|o| catalog::available_levels(o, &milestones, None))
        .unwrap_or_default();
    let milestone_options: Vec<serde_json::Value> = selected_offering
        .map(|o| {
            milestones
                .iter()
                .filter(|m| m.oid == o.oid)
                .map(|m| json!({ "id": m.mid, "label": format!("ID: {} (Level: {})", m.mid, m.level) }))
                .collect()
        })
        .unwrap_or_default();

    ok(
        &req.id,
        json!({
            "selection": chain.selections(),
            "gurukuls": chain.option_items(0),
            "offerings": chain.option_items(1),
            "levels": levels,
            "milestones": milestone_options
        }),
    )
}

fn handle_level_options(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(oid) = i64_param(&req.params, "oid") else {
        return err(&req.id, "bad_params", "missing oid", None);
    };
    let exclude_mid = i64_param(&req.params, "excludeMid");

    let offerings = match catalog::offerings(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let Some(offering) = offerings.iter().find(|o| o.oid == oid) else {
        return err(&req.id, "not_found", "offering not found", None);
    };
    let milestones = match catalog::milestones(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    ok(
        &req.id,
        json!({ "levels": catalog::available_levels(offering, &milestones, exclude_mid) }),
    )
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(class) = i64_param(&req.params, "class") else {
        return err(&req.id, "bad_params", "missing class", None);
    };
    if class < 1 {
        return err(&req.id, "bad_params", "class must be at least 1", None);
    }
    let Some(level) = str_param(&req.params, "level") else {
        return err(&req.id, "bad_params", "missing level", None);
    };
    let Some(oid) = i64_param(&req.params, "oid") else {
        return err(&req.id, "bad_params", "missing oid", None);
    };

    let offerings = match catalog::offerings(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let Some(offering) = offerings.iter().find(|o| o.oid == oid) else {
        return err(&req.id, "bad_params", "unknown parent offering", None);
    };
    if !catalog::levels_for_gtype(&offering.gtype).contains(&level.as_str()) {
        return err(
            &req.id,
            "bad_params",
            format!("level {level} is not valid for a {} offering", offering.gtype),
            None,
        );
    }
    let milestones = match catalog::milestones(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let siblings: HashSet<String> = milestones
        .iter()
        .filter(|m| m.oid == oid)
        .map(|m| m.level.clone())
        .collect();
    if !guard::value_is_free(&level, &siblings, None) {
        return err(
            &req.id,
            "duplicate",
            format!("Offering {oid} already has a {level} milestone."),
            None,
        );
    }

    let resp = state.api.post(
        "/milestones",
        &json!({ "class": class, "level": level, "oid": oid }),
    );
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "milestone": resp.body }))
}

/// Partial update. The offering is pinned: a level change stays within the
/// milestone's own offering, and the backend wants the oid sent along with it.
fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(mid) = i64_param(&req.params, "mid") else {
        return err(&req.id, "bad_params", "missing mid", None);
    };

    let milestones = match catalog::milestones(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let Some(current) = milestones.iter().find(|m| m.mid == mid).cloned() else {
        return err(&req.id, "not_found", "milestone not found", None);
    };

    let mut payload = serde_json::Map::new();
    if let Some(class) = i64_param(&req.params, "class") {
        if class < 1 {
            return err(&req.id, "bad_params", "class must be at least 1", None);
        }
        if class != current.class {
            payload.insert("class".into(), json!(class));
        }
    }
    if let Some(level) = str_param(&req.params, "level") {
        if level != current.level {
            let offerings = match catalog::offerings(&state.api, &mut state.cache) {
                Ok(v) => v,
                Err(resp) => return api_err(&req.id, &resp),
            };
            let Some(offering) = offerings.iter().find(|o| o.oid == current.oid) else {
                return err(&req.id, "not_found", "parent offering not found", None);
            };
            if !catalog::levels_for_gtype(&offering.gtype).contains(&level.as_str()) {
                return err(
                    &req.id,
                    "bad_params",
                    format!("level {level} is not valid for a {} offering", offering.gtype),
                    None,
                );
            }
            let siblings: HashSet<String> = milestones
                .iter()
                .filter(|m| m.oid == current.oid && m.mid != mid)
                .map(|m| m.level.clone())
                .collect();
            if !guard::value_is_free(&level, &siblings, None) {
                return err(
                    &req.id,
                    "duplicate",
                    format!("Offering {} already has a {level} milestone.", current.oid),
                    None,
                );
            }
            payload.insert("level".into(), json!(level));
            payload.insert("oid".into(), json!(current.oid));
        }
    }

    if payload.is_empty() {
        return ok(&req.id, json!({ "changed": false }));
    }

    let resp = state
        .api
        .put(&format!("/milestones/{mid}"), &serde_json::Value::Object(payload));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "milestone": resp.body, "changed": true }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(mid) = i64_param(&req.params, "mid") else {
        return err(&req.id, "bad_params", "missing mid", None);
    };
    let resp = state.api.delete(&format!("/milestones/{mid}"));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "deleted": mid }))
}

fn handle_distinct_levels(state: &mut AppState, req: &Request) -> serde_json::Value {
    let levels = match catalog::distinct_milestone_levels(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    ok(&req.id, json!({ "levels": levels }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "milestones.list" => Some(handle_list(state, req)),
        "milestones.chain.set" => Some(handle_chain_set(state, req)),
        "milestones.levelOptions" => Some(handle_level_options(state, req)),
        "milestones.create" => Some(handle_create(state, req)),
        "milestones.update" => Some(handle_update(state, req)),
        "milestones.delete" => Some(handle_delete(state, req)),
        "milestones.distinctLevels" => Some(handle_distinct_levels(state, req)),
        _ => None,
    }
}
