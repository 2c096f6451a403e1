//! Activity log payloads
//!
//! Each action type carries a fixed set of fields. Stored payloads that no
//! longer decode (older formats, hand-edited rows) come back as
//! [`ActivityDetails::Unknown`] rather than being guessed at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SessionStatus;

/// Kind of record an activity refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Session,
    ScheduledSession,
    Report,
    TrainingModule,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum ActivityDetails {
    Create {
        entity: EntityKind,
        entity_id: Uuid,
    },
    Update {
        entity: EntityKind,
        entity_id: Uuid,
        fields: Vec<String>,
    },
    Delete {
        entity: EntityKind,
        entity_id: Uuid,
    },
    Transition {
        session_id: Uuid,
        from: Option<SessionStatus>,
        to: SessionStatus,
    },
    Login {
        user_id: Uuid,
    },
    Dedup {
        scope_key: String,
        merged_groups: usize,
    },
    UndoDedup {
        scope_key: String,
        cleared_lines: u64,
    },
    #[serde(other)]
    Unknown,
}

impl ActivityDetails {
    /// Value stored in the `action` column
    pub fn action(&self) -> &'static str {
        match self {
            ActivityDetails::Create { .. } => "CREATE",
            ActivityDetails::Update { .. } => "UPDATE",
            ActivityDetails::Delete { .. } => "DELETE",
            ActivityDetails::Transition { .. } => "TRANSITION",
            ActivityDetails::Login { .. } => "LOGIN",
            ActivityDetails::Dedup { .. } => "DEDUP",
            ActivityDetails::UndoDedup { .. } => "UNDO_DEDUP",
            ActivityDetails::Unknown => "UNKNOWN",
        }
    }

    /// Decode a stored payload
    ///
    /// The payload must decode to the variant named by `action`; anything
    /// else yields `Unknown`.
    pub fn decode(action: &str, payload: &str) -> Self {
        match serde_json::from_str::<ActivityDetails>(payload) {
            Ok(details) if details.action() == action => details,
            _ => ActivityDetails::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: Uuid,
    pub action: String,
    pub details: ActivityDetails,
    pub created_at: DateTime<Utc>,
}
