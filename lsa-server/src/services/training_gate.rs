//! Training gate consulted before a session may go live

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::error::ApiResult;
use crate::models::{GateDecision, UserRole};

/// Decides whether a user may start a live session
#[async_trait]
pub trait TrainingGate: Send + Sync {
    async fn is_allowed_to_start(&self, user_id: Uuid) -> ApiResult<GateDecision>;
}

/// Gate backed by the `users` and `module_progress` tables
///
/// The rule is evaluated entirely from server-side state: role, the
/// persisted skip flag, and completions over ACTIVE modules.
pub struct SqliteTrainingGate {
    db: SqlitePool,
}

impl SqliteTrainingGate {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TrainingGate for SqliteTrainingGate {
    async fn is_allowed_to_start(&self, user_id: Uuid) -> ApiResult<GateDecision> {
        let user = db::users::get_user(&self.db, user_id).await?;
        let (role, skip_tutorial) = match user {
            Some(user) => (user.role, user.skip_tutorial),
            None => (UserRole::Streamer, false),
        };

        let (completed, total) = db::training::completion_counts(&self.db, user_id).await?;
        let decision = GateDecision::evaluate(role, skip_tutorial, completed, total);

        tracing::debug!(
            user_id = %user_id,
            role = role.as_str(),
            skip_tutorial,
            completed,
            total,
            allowed = decision.allowed,
            "Training gate evaluated"
        );

        Ok(decision)
    }
}
