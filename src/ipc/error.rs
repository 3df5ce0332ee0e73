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

/// Reply for a line that is not a valid request. There is no id to echo.
pub fn bad_json(message: impl Into<String>) -> serde_json::Value {
    json!({
        "ok": false,
        "error": { "code": "bad_json", "message": message.into() },
    })
}

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn query_failed(e: anyhow::Error) -> Self {
        tracing::warn!(error = %format!("{e:#}"), "store query failed");
        Self::new("db_query_failed", format!("{e:#}"))
    }

    pub fn serialize_failed(e: serde_json::Error) -> Self {
        tracing::warn!(error = %e, "response serialization failed");
        Self::new("serialize_failed", e.to_string())
    }

    pub fn update_failed(e: anyhow::Error) -> Self {
        tracing::warn!(error = %format!("{e:#}"), "store update failed");
        Self::new("db_update_failed", format!("{e:#}"))
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}
