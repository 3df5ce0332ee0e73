//! Free-text attendance assistant: intent rules, entity extraction, per-session context
//! and the dispatcher that turns a query into a typed response envelope.

mod context;
mod dispatch;
mod entities;
mod response;
mod rules;

pub use context::ConversationContext;
pub use dispatch::Assistant;
