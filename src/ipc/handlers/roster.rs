use crate::assign;
use crate::catalog;
use crate::ipc::error::{api_err, err, ok};
use crate::ipc::helpers::{i64_param, id_list_param, opt_id_param, str_param};
use crate::ipc::types::{AppState, Request};
use crate::selection::{ChainItem, SelectorChain};
use serde_json::json;
use std::collections::HashSet;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let students = match catalog::direct_students(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let options: Vec<serde_json::Value> = students
        .iter()
        .map(|s| json!({ "id": s.sid, "label": format!("{} (ID: {})", s.sname, s.sid) }))
        .collect();
    ok(&req.id, json!({ "students": students, "options": options }))
}

/// Gurukul → milestone chain for the add/update sections. Milestones come
/// from the by-gurukul endpoint for whichever gurukul ends up selected.
fn handle_students_chain_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(scope) = str_param(&req.params, "scope") else {
        return err(&req.id, "bad_params", "missing scope", None);
    };
    if scope != "add" && scope != "update" {
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
    let placeable: Vec<ChainItem> =
        catalog::gurukuls_with_milestones(&gurukuls, &offerings, &milestones)
            .iter()
            .map(|g| ChainItem::root(g.gid, format!("{} (ID: {})", g.gname, g.gid)))
            .collect();

    // Which gurukul the milestone level will hang off after this update.
    let scope_key = format!("roster.students.{scope}");
    let prior = state.chains.get(&scope_key).and_then(|c| c.selection(0));
    let target_gid = if level == 0 { id } else { prior };

    let milestone_items: Vec<ChainItem> = match target_gid {
        Some(gid) => {
            let for_gurukul =
                match catalog::milestones_by_gurukul(&state.api, &mut state.cache, gid) {
                    Ok(v) => v,
                    Err(resp) => return api_err(&req.id, &resp),
                };
            for_gurukul
                .iter()
                .map(|m| {
                    ChainItem::child(
                        m.mid,
                        gid,
                        format!("Level {} (Class: {}, ID: {})", m.level, m.class, m.mid),
                    )
                })
                .collect()
        }
        None => Vec::new(),
    };

    let chain = state
        .chains
        .entry(scope_key)
        .or_insert_with(|| SelectorChain::new(2));
    chain.reload(vec![placeable, milestone_items]);
    chain.set_selection(level as usize, id);

    ok(
        &req.id,
        json!({
            "selection": chain.selections(),
            "gurukuls": chain.option_items(0),
            "milestones": chain.option_items(1)
        }),
    )
}

/// A milestone id only makes sense under its own gurukul; reject anything
/// that does not come from the by-gurukul list.
fn milestone_belongs(
    state: &mut AppState,
    gid: i64,
    mid: i64,
) -> Result<bool, crate::api::ApiResponse> {
    let for_gurukul = catalog::milestones_by_gurukul(&state.api, &mut state.cache, gid)?;
    Ok(for_gurukul.iter().any(|m| m.mid == mid))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sname) = str_param(&req.params, "sname") else {
        return err(&req.id, "bad_params", "missing sname", None);
    };
    let Some(email) = str_param(&req.params, "email") else {
        return err(&req.id, "bad_params", "missing email", None);
    };
    let Some(gurukul_id) = i64_param(&req.params, "gurukulId") else {
        return err(&req.id, "bad_params", "gurukulId is mandatory", None);
    };
    let milestone_id = match opt_id_param(&req.params, "milestoneId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let gurukuls = match catalog::gurukuls(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    if !gurukuls.iter().any(|g| g.gid == gurukul_id) {
        return err(&req.id, "bad_params", "unknown gurukul", None);
    }
    if let Some(mid) = milestone_id {
        match milestone_belongs(state, gurukul_id, mid) {
            Ok(true) => {}
            Ok(false) => {
                return err(
                    &req.id,
                    "bad_params",
                    "milestone does not belong to the selected gurukul",
                    None,
                )
            }
            Err(resp) => return api_err(&req.id, &resp),
        }
    }

    let resp = state.api.post(
        "/students",
        &json!({
            "sname": sname,
            "email": email,
            "gurukulId": gurukul_id,
            "milestoneId": milestone_id
        }),
    );
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "student": resp.body }))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sid) = i64_param(&req.params, "sid") else {
        return err(&req.id, "bad_params", "missing sid", None);
    };
    let Some(sname) = str_param(&req.params, "sname") else {
        return err(&req.id, "bad_params", "missing sname", None);
    };
    let Some(email) = str_param(&req.params, "email") else {
        return err(&req.id, "bad_params", "missing email", None);
    };
    let gurukul_id = match opt_id_param(&req.params, "gurukulId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let milestone_id = match opt_id_param(&req.params, "milestoneId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let students = match catalog::direct_students(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    if !students.iter().any(|s| s.sid == sid) {
        return err(&req.id, "not_found", "student not found", None);
    }

    let (gurukul_id, milestone_id) = assign::coupled_placement(gurukul_id, milestone_id);
    if let (Some(gid), Some(mid)) = (gurukul_id, milestone_id) {
        match milestone_belongs(state, gid, mid) {
            Ok(true) => {}
            Ok(false) => {
                return err(
                    &req.id,
                    "bad_params",
                    "milestone does not belong to the selected gurukul",
                    None,
                )
            }
            Err(resp) => return api_err(&req.id, &resp),
        }
    }

    let resp = state.api.put(
        &format!("/students/{sid}"),
        &json!({
            "sname": sname,
            "email": email,
            "gurukulId": gurukul_id,
            "milestoneId": milestone_id
        }),
    );
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "student": resp.body }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sid) = i64_param(&req.params, "sid") else {
        return err(&req.id, "bad_params", "missing sid", None);
    };
    let resp = state.api.delete(&format!("/students/{sid}"));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "deleted": sid }))
}

fn handle_teachers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teachers = match catalog::direct_teachers(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let options: Vec<serde_json::Value> = teachers
        .iter()
        .map(|t| json!({ "id": t.teachid, "label": format!("{} (ID: {})", t.name, t.teachid) }))
        .collect();
    ok(&req.id, json!({ "teachers": teachers, "options": options }))
}

fn checked_subject_ids(
    state: &mut AppState,
    req: &Request,
) -> Result<Vec<i64>, serde_json::Value> {
    let subject_ids = match id_list_param(&req.params, "subjectIds") {
        Ok(v) => v,
        Err(m) => return Err(err(&req.id, "bad_params", m, None)),
    };
    let subjects = match catalog::subjects(&state.api, &mut state.cache) {
        Ok(v) => v,
        Err(resp) => return Err(api_err(&req.id, &resp)),
    };
    let known: HashSet<i64> = subjects.iter().map(|s| s.subid).collect();
    let desired = assign::desired_set(&subject_ids);
    if let Some(unknown) = desired.iter().find(|id| !known.contains(id)) {
        return Err(err(
            &req.id,
            "bad_params",
            format!("unknown subject id {unknown}"),
            None,
        ));
    }
    Ok(desired.into_iter().collect())
}

fn handle_teachers_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(name) = str_param(&req.params, "name") else {
        return err(&req.id, "bad_params", "missing name", None);
    };
    let Some(email) = str_param(&req.params, "email") else {
        return err(&req.id, "bad_params", "missing email", None);
    };
    let subject_ids = match checked_subject_ids(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let resp = state.api.post(
        "/teachers",
        &json!({ "name": name, "email": email, "subjectIds": subject_ids }),
    );
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "teacher": resp.body }))
}

fn handle_teachers_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(teachid) = i64_param(&req.params, "teachid") else {
        return err(&req.id, "bad_params", "missing teachid", None);
    };
    let Some(name) = str_param(&req.params, "name") else {
        return err(&req.id, "bad_params", "missing name", None);
    };
    let Some(email) = str_param(&req.params, "email") else {
        return err(&req.id, "bad_params", "missing email", None);
    };
    let subject_ids = match checked_subject_ids(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let resp = state.api.put(
        &format!("/teachers/{teachid}"),
        &json!({ "name": name, "email": email, "subjectIds": subject_ids }),
    );
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "teacher": resp.body }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.students.list" => Some(handle_students_list(state, req)),
        "roster.students.chain.set" => Some(handle_students_chain_set(state, req)),
        "roster.students.create" => Some(handle_students_create(state, req)),
        "roster.students.update" => Some(handle_students_update(state, req)),
        "roster.students.delete" => Some(handle_students_delete(state, req)),
        "roster.teachers.list" => Some(handle_teachers_list(state, req)),
        "roster.teachers.create" => Some(handle_teachers_create(state, req)),
        "roster.teachers.update" => Some(handle_teachers_update(state, req)),
        _ => None,
    }
}
