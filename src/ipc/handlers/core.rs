use crate::ipc::error::{err, ok};
use crate::ipc::helpers::str_param;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let cached: Vec<serde_json::Value> = state
        .cache
        .snapshot()
        .into_iter()
        .map(|(key, fetched_at)| json!({ "key": key, "fetchedAt": fetched_at.to_rfc3339() }))
        .collect();
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "apiUrl": state.cfg.api_url,
            "cacheTtlSecs": state.cache.ttl().as_secs(),
            "cachedLists": cached
        }),
    )
}

/// Navigation boundary: the page's selector chains are rebuilt from scratch
/// and every cached list is dropped, so nothing leaks between pages.
fn handle_page_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(page) = str_param(&req.params, "page") else {
        return err(&req.id, "bad_params", "missing params.page", None);
    };
    state.chains.retain(|scope, _| !scope.starts_with(&page));
    state.cache.invalidate_all();
    ok(&req.id, json!({ "page": page }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "page.open" => Some(handle_page_open(state, req)),
        _ => None,
    }
}
