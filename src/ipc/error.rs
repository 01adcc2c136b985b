use crate::api::ApiResponse;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Failed gateway response → error reply, keeping the backend's message and
/// the raw status visible to the UI.
pub fn api_err(id: &str, resp: &ApiResponse) -> serde_json::Value {
    err(
        id,
        resp.error_code(),
        resp.message(),
        Some(json!({ "status": resp.status })),
    )
}
