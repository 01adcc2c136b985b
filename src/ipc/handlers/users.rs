use crate::catalog;
use crate::ipc::error::{api_err, err, ok};
use crate::ipc::helpers::{bool_param, i64_param, str_param};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

const ROLES: [&str; 2] = ["student", "teacher"];

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let role = str_param(&req.params, "role");
    if let Some(role) = role.as_deref() {
        if !ROLES.contains(&role) {
            return err(&req.id, "bad_params", format!("unknown role '{role}'"), None);
        }
    }

    let mut users = match catalog::users(&state.api, &mut state.cache, role.as_deref()) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    users.sort_by_key(|u| u.userid);
    let options: Vec<serde_json::Value> = users
        .iter()
        .map(|u| {
            json!({
                "id": u.userid,
                "label": format!("ID: {} ({} - {})", u.userid, u.username, u.role)
            })
        })
        .collect();
    ok(&req.id, json!({ "users": users, "options": options }))
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(username) = str_param(&req.params, "username") else {
        return err(&req.id, "bad_params", "missing username", None);
    };
    let Some(email) = str_param(&req.params, "email") else {
        return err(&req.id, "bad_params", "missing email", None);
    };
    let Some(password) = str_param(&req.params, "password") else {
        return err(&req.id, "bad_params", "missing password", None);
    };
    let Some(role) = str_param(&req.params, "role") else {
        return err(&req.id, "bad_params", "missing role", None);
    };
    if !ROLES.contains(&role.as_str()) {
        return err(&req.id, "bad_params", format!("unknown role '{role}'"), None);
    }

    // The backend hashes the password and creates the role-linked row.
    let resp = state.api.post(
        "/users",
        &json!({ "username": username, "email": email, "password": password, "role": role }),
    );
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "user": resp.body }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(userid) = i64_param(&req.params, "userid") else {
        return err(&req.id, "bad_params", "missing userid", None);
    };

    let users = match catalog::users(&state.api, &mut state.cache, None) {
        Ok(v) => v,
        Err(resp) => return api_err(&req.id, &resp),
    };
    let Some(current) = users.iter().find(|u| u.userid == userid).cloned() else {
        return err(&req.id, "not_found", "user not found", None);
    };

    // Only changed fields travel; an empty password means "keep current".
    let mut payload = serde_json::Map::new();
    if let Some(username) = str_param(&req.params, "username") {
        if username != current.username {
            payload.insert("username".into(), json!(username));
        }
    }
    if let Some(email) = str_param(&req.params, "email") {
        if email != current.email {
            payload.insert("email".into(), json!(email));
        }
    }
    if let Some(password) = str_param(&req.params, "password") {
        payload.insert("password".into(), json!(password));
    }
    if let Some(role) = str_param(&req.params, "role") {
        if !ROLES.contains(&role.as_str()) {
            return err(&req.id, "bad_params", format!("unknown role '{role}'"), None);
        }
        if role != current.role {
            payload.insert("role".into(), json!(role));
        }
    }
    if let Some(isdeleted) = bool_param(&req.params, "isdeleted") {
        if isdeleted != current.isdeleted {
            payload.insert("isdeleted".into(), json!(isdeleted));
        }
    }

    if payload.is_empty() {
        return ok(&req.id, json!({ "changed": false }));
    }

    let resp = state
        .api
        .put(&format!("/users/{userid}"), &serde_json::Value::Object(payload));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "user": resp.body, "changed": true }))
}

fn handle_soft_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(userid) = i64_param(&req.params, "userid") else {
        return err(&req.id, "bad_params", "missing userid", None);
    };
    // The backend marks isdeleted rather than removing the row.
    let resp = state.api.delete(&format!("/users/{userid}"));
    if !resp.is_success() {
        return api_err(&req.id, &resp);
    }
    state.cache.invalidate_all();
    ok(&req.id, json!({ "deleted": userid }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.list" => Some(handle_list(state, req)),
        "users.create" => Some(handle_create(state, req)),
        "users.update" => Some(handle_update(state, req)),
        "users.softDelete" => Some(handle_soft_delete(state, req)),
        _ => None,
    }
}
