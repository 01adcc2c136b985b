use crate::assign;
use crate::catalog;
use crate::ipc::error::{api_err, err, ok};
use crate::ipc::helpers::{i64_param, opt_id_param};
use crate::ipc::types::{AppState, Request};
use crate::selection::{ChainItem, SelectorChain};
use serde_json::json;

const CHAIN_SCOPE: &str = "students.assign";

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let students = match catalog::users(&state.api, &mut state.cache, Some("student")) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let options: Vec<serde_json::Value> = students
        .iter()
        .map(|s| json!({ "id": s.userid, "label": format!("{} (ID: {})", s.username, s.userid) }))
        .collect();
    ok(&req.id, json!({ "students": students, "options": options }))
}

/// Gurukuls that can actually be assigned: only those with at least one
/// milestone reachable through an offering.
fn handle_assignable(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let mut placeable = catalog::gurukuls_with_milestones(&gurukuls, &offerings, &milestones);
    placeable.sort_by(|a, b| a.gname.cmp(&b.gname));
    let options: Vec<serde_json::Value> = placeable
        .iter()
        .map(|g| json!({ "id": g.gid, "label": format!("{} (ID: {})", g.gname, g.gid) }))
        .collect();
    ok(&req.id, json!({ "gurukuls": options }))
}

/// Gurukul → offering → milestone chain for the combined assignment section.
fn handle_chain_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(level) = i64_param(&req.params, "level") else {
        return err(&req.id, "bad_params", "missing level", None);
    };
    if !(0..=2).contains(&level) {
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

    let placeable = catalog::gurukuls_with_milestones(&gurukuls, &offerings, &milestones);
    let snapshot = vec![
        placeable
            .iter()
            .map(|g| ChainItem::root(g.gid, format!("{} (ID: {})", g.gname, g.gid)))
            .collect(),
        offerings
            .iter()
            .map(|o| ChainItem::child(o.oid, o.gid, format!("{} (OID: {})", o.gtype, o.oid)))
            .collect(),
        milestones
            .iter()
            .map(|m| {
                ChainItem::child(
                    m.mid,
                    m.oid,
                    format!("{} (Level: {}, MID: {})", m.class, m.level, m.mid),
                )
            })
            .collect(),
    ];
    let chain = state
        .chains
        .entry(CHAIN_SCOPE.to_string())
        .or_insert_with(|| SelectorChain::new(3));
    chain.reload(snapshot);
    chain.set_selection(level as usize, id);

    ok(
        &req.id,
        json!({
            "selection": chain.selections(),
            "gurukuls": chain.option_items(0),
            "offerings": chain.option_items(1),
            "milestones": chain.option_items(2)
        }),
    )
}

/// Replace the student's gurukul/milestone placement through the users API.
/// The payload always carries both keys; null unassigns, and an unassigned
/// gurukul drags the milestone to null with it.
fn handle_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(userid) = i64_param(&req.params, "userid") else {
        return err(&req.id, "bad_params", "missing userid", None);
    };
    let gurukul_id = match opt_id_param(&req.params, "gurukulId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let milestone_id = match opt_id_param(&req.params, "milestoneId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let students = match catalog::users(&state.api, &mut state.cache, Some("student")) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let Some(student) = students.iter().find(|s| s.userid == userid) else {
        return err(&req.id, "not_found", "student user not found", None);
    };
    if student.user_role_link.is_none() {
        return err(
            &req.id,
            "missing_role_link",
            format!("user '{}' has no student record linked", student.username),
            None,
        );
    }

    if let Some(gid) = gurukul_id {
        let gurukuls = match catalog::gurukuls(&state.api, &mut state.cache) {
            Ok(v) => v,
            Err(resp) => return api_err(&req.id, &resp),
        };
        if !gurukuls.iter().any(|g| g.gid == gid) {
            return err(&req.id, "bad_params", "unknown gurukul", None);
        }
    }

    let payload = assign::placement_payload(gurukul_id, milestone_id);
    let resp = state.api.put(&format!("/users/{userid}"), &payload);
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "user": resp.body }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_list(state, req)),
        "students.assignable" => Some(handle_assignable(state, req)),
        "students.chain.set" => Some(handle_chain_set(state, req)),
        "students.assign" => Some(handle_assign(state, req)),
        _ => None,
    }
}
