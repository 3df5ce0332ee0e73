use crate::assistant::{Assistant, ConversationContext};
use crate::config;
use crate::db::SqliteStore;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{date_or_today, json_value, optional_str};
use crate::ipc::types::{AppState, Request};
use serde_json::Value;

const DEFAULT_SESSION: &str = "default";
const DEFAULT_ROLE: &str = "staff";

fn session_key(params: &Value) -> String {
    optional_str(params, "session").unwrap_or_else(|| DEFAULT_SESSION.to_string())
}

fn assistant_query(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let AppState { db, sessions, .. } = state;
    let Some(conn) = db.as_ref() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };
    // Blank text is allowed and answered with the default overview.
    let text = params
        .get("text")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing text"))?
        .to_string();
    let role = optional_str(params, "role").unwrap_or_else(|| DEFAULT_ROLE.to_string());
    let today = date_or_today(params, "today")?;
    let session = session_key(params);

    let settings = config::load_settings(conn).map_err(HandlerErr::query_failed)?;
    let store = SqliteStore::new(conn);
    let ctx = sessions.entry(session.clone()).or_default();

    let envelope = Assistant::new(&store, &settings)
        .answer_query(ctx, &text, &role, today)
        .map_err(HandlerErr::query_failed)?;
    tracing::debug!(
        session = %session,
        response = envelope.body.kind(),
        follow_up = envelope.follow_up,
        message = envelope.body.message(),
        "assistant answered"
    );
    json_value(&envelope)
}

fn assistant_context(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let session = session_key(params);
    match state.sessions.get(&session) {
        Some(ctx) => json_value(ctx),
        None => json_value(&ConversationContext::new()),
    }
}

fn respond(req: &Request, result: Result<Value, HandlerErr>) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assistant.query" => Some(respond(req, assistant_query(state, &req.params))),
        "assistant.context" => {
            if state.db.is_none() {
                return Some(err(&req.id, "no_workspace", "select a workspace first", None));
            }
            Some(respond(req, assistant_context(state, &req.params)))
        }
        _ => None,
    }
}
