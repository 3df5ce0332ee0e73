use super::entities::Entities;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-session memory used to resolve follow-up questions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub last_query: Option<String>,
    pub last_class: Option<String>,
    pub last_student: Option<String>,
    pub last_date: Option<NaiveDate>,
    pub preferences: BTreeMap<String, String>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_previous_query(&self) -> bool {
        self.last_query.is_some()
    }

    pub(crate) fn record_query(&mut self, raw: &str) {
        self.last_query = Some(raw.to_string());
    }

    /// Entities found in the current query overwrite what was remembered; missing ones
    /// leave the previous value in place.
    pub(crate) fn remember(&mut self, entities: &Entities) {
        if let Some(class_name) = &entities.class_name {
            self.last_class = Some(class_name.clone());
        }
        if let Some(student) = &entities.student {
            self.last_student = Some(student.clone());
        }
        if entities.date_explicit {
            self.last_date = Some(entities.date);
        }
    }
}
