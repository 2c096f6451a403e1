//! Live session lifecycle
//!
//! Owns every status change of a session. Each mutation:
//! 1. loads the session scoped to its owner (absent or foreign → NotFound)
//! 2. checks the expected status up front (wrong status → Conflict)
//! 3. writes with an UPDATE conditioned on id, owner and that status, in a
//!    transaction with its activity record; zero affected rows means a
//!    concurrent request won, which is also a Conflict.

use chrono::{DateTime, Utc};
use lsa_common::Clock;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::training_gate::TrainingGate;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    ActivityDetails, AiMetrics, EntityKind, FinishInput, FinishOutcome, LivePatch, LiveSession,
    ScheduleInput, ScheduledPatch, SessionStatus, SessionWithProducts, StartInput,
};

pub struct SessionLifecycle {
    db: SqlitePool,
    gate: Arc<dyn TrainingGate>,
    clock: Arc<dyn Clock>,
}

fn blank_session(owner_id: Uuid, status: SessionStatus, now: DateTime<Utc>) -> LiveSession {
    LiveSession {
        id: Uuid::new_v4(),
        owner_id,
        title: None,
        description: None,
        status,
        scheduled_at: None,
        started_at: None,
        finished_at: None,
        followers_start: None,
        followers_end: None,
        coins_start: None,
        coins_end: None,
        duration_minutes: None,
        followers_gained: None,
        coins_spent: None,
        live_link: None,
        peak_viewers: None,
        chat_interactions: None,
        notes: None,
        likes: None,
        shares: None,
        comments: None,
        views: None,
        engagement_rate: None,
        created_at: now,
        updated_at: now,
    }
}

fn require_status(session: &LiveSession, expected: SessionStatus) -> ApiResult<()> {
    if session.status == expected {
        Ok(())
    } else {
        Err(ApiError::Conflict(format!(
            "Session {} is {}, expected {}",
            session.id, session.status, expected
        )))
    }
}

fn require_transition(session: &LiveSession, next: SessionStatus) -> ApiResult<()> {
    if session.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(ApiError::Conflict(format!(
            "Session {} cannot move from {} to {}",
            session.id, session.status, next
        )))
    }
}

fn lost_race(session_id: Uuid) -> ApiError {
    ApiError::Conflict(format!("Session {} was modified concurrently", session_id))
}

impl SessionLifecycle {
    pub fn new(db: SqlitePool, gate: Arc<dyn TrainingGate>, clock: Arc<dyn Clock>) -> Self {
        Self { db, gate, clock }
    }

    async fn load_owned(&self, session_id: Uuid, owner_id: Uuid) -> ApiResult<LiveSession> {
        db::sessions::get_owned(&self.db, session_id, owner_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Session not found: {}", session_id)))
    }

    async fn with_products(&self, session: LiveSession) -> ApiResult<SessionWithProducts> {
        let products = db::sessions::list_products(&self.db, session.id).await?;
        Ok(SessionWithProducts { session, products })
    }

    pub async fn get(&self, session_id: Uuid, owner_id: Uuid) -> ApiResult<SessionWithProducts> {
        let session = self.load_owned(session_id, owner_id).await?;
        self.with_products(session).await
    }

    pub async fn list(&self, owner_id: Uuid) -> ApiResult<Vec<LiveSession>> {
        Ok(db::sessions::list_by_owner(&self.db, owner_id, None).await?)
    }

    pub async fn list_scheduled(&self, owner_id: Uuid) -> ApiResult<Vec<SessionWithProducts>> {
        let sessions =
            db::sessions::list_by_owner(&self.db, owner_id, Some(SessionStatus::Scheduled)).await?;
        let mut result = Vec::with_capacity(sessions.len());
        for session in sessions {
            result.push(self.with_products(session).await?);
        }
        Ok(result)
    }

    pub async fn active(&self, owner_id: Uuid) -> ApiResult<LiveSession> {
        db::sessions::find_in_progress(&self.db, owner_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("No session in progress".to_string()))
    }

    /// Create a SCHEDULED session; no gate check
    pub async fn schedule(&self, owner_id: Uuid, input: ScheduleInput) -> ApiResult<SessionWithProducts> {
        input.validate()?;
        let now = self.clock.now();

        let mut session = blank_session(owner_id, SessionStatus::Scheduled, now);
        session.title = Some(input.title.trim().to_string());
        session.description = input.description;
        session.scheduled_at = Some(input.scheduled_at);

        let mut tx = self.db.begin().await?;
        db::sessions::insert_session(&mut *tx, &session).await?;
        db::sessions::insert_products(&mut tx, session.id, &input.products).await?;
        db::activity::record(
            &mut *tx,
            owner_id,
            &ActivityDetails::Create {
                entity: EntityKind::ScheduledSession,
                entity_id: session.id,
            },
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            session_id = %session.id,
            owner_id = %owner_id,
            scheduled_at = %input.scheduled_at,
            products = input.products.len(),
            "Session scheduled"
        );

        self.get(session.id, owner_id).await
    }

    /// Go live, creating a new session or promoting a scheduled one
    pub async fn start(&self, owner_id: Uuid, input: StartInput) -> ApiResult<LiveSession> {
        input.validate()?;

        let decision = self.gate.is_allowed_to_start(owner_id).await?;
        if !decision.allowed {
            warn!(
                owner_id = %owner_id,
                completed = decision.completed,
                total = decision.total,
                "Start denied by training gate"
            );
            return Err(ApiError::TrainingIncomplete {
                completed: decision.completed,
                total: decision.total,
            });
        }

        if let Some(active) = db::sessions::find_in_progress(&self.db, owner_id).await? {
            return Err(ApiError::Conflict(format!(
                "Session {} is already in progress",
                active.id
            )));
        }

        let now = self.clock.now();
        let live_link = input
            .live_link
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty());

        if let Some(scheduled_id) = input.scheduled_session_id {
            let scheduled = self.load_owned(scheduled_id, owner_id).await?;
            require_transition(&scheduled, SessionStatus::InProgress)?;
        }

        // Write first: a concurrent writer waits on the lock, then sees the committed status.
        let mut tx = self.db.begin().await?;
        let (session_id, from) = match input.scheduled_session_id {
            Some(scheduled_id) => {
                let affected = db::sessions::promote_to_in_progress(
                    &mut *tx,
                    scheduled_id,
                    owner_id,
                    input.followers_start,
                    input.coins_start,
                    live_link,
                    now,
                )
                .await?;
                if affected == 0 {
                    return Err(lost_race(scheduled_id));
                }
                (scheduled_id, Some(SessionStatus::Scheduled))
            }
            None => {
                let mut session = blank_session(owner_id, SessionStatus::InProgress, now);
                session.started_at = Some(now);
                session.followers_start = Some(input.followers_start);
                session.coins_start = Some(input.coins_start);
                session.live_link = live_link.map(str::to_string);
                // A concurrent start trips the one-live-per-owner index here.
                db::sessions::insert_session(&mut *tx, &session).await?;
                (session.id, None)
            }
        };
        db::activity::record(
            &mut *tx,
            owner_id,
            &ActivityDetails::Transition {
                session_id,
                from,
                to: SessionStatus::InProgress,
            },
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            session_id = %session_id,
            owner_id = %owner_id,
            followers_start = input.followers_start,
            coins_start = input.coins_start,
            promoted = from.is_some(),
            "Session started"
        );

        self.load_owned(session_id, owner_id).await
    }

    /// Partial update while IN_PROGRESS
    pub async fn update_live(&self, session_id: Uuid, owner_id: Uuid, patch: LivePatch) -> ApiResult<LiveSession> {
        patch.validate()?;
        let session = self.load_owned(session_id, owner_id).await?;
        require_status(&session, SessionStatus::InProgress)?;
        if patch.is_empty() {
            return Ok(session);
        }

        let now = self.clock.now();
        let mut fields = Vec::new();
        if patch.peak_viewers.is_some() {
            fields.push("peakViewers".to_string());
        }
        if patch.chat_interactions.is_some() {
            fields.push("chatInteractions".to_string());
        }
        if patch.notes.is_some() {
            fields.push("notes".to_string());
        }

        let mut tx = self.db.begin().await?;
        let affected = db::sessions::update_live(&mut *tx, session_id, owner_id, &patch, now).await?;
        if affected == 0 {
            return Err(lost_race(session_id));
        }
        db::activity::record(
            &mut *tx,
            owner_id,
            &ActivityDetails::Update {
                entity: EntityKind::Session,
                entity_id: session_id,
                fields,
            },
            now,
        )
        .await?;
        tx.commit().await?;

        self.load_owned(session_id, owner_id).await
    }

    /// The caller's session, if it may be finished now
    ///
    /// Lets callers reject a finish before doing any upload work for it.
    pub async fn finishable(&self, session_id: Uuid, owner_id: Uuid) -> ApiResult<LiveSession> {
        let session = self.load_owned(session_id, owner_id).await?;
        require_transition(&session, SessionStatus::Finished)?;
        Ok(session)
    }

    /// IN_PROGRESS → FINISHED
    ///
    /// `extracted` holds metrics read from screenshots; explicitly submitted
    /// fields take precedence and absent fields never overwrite.
    pub async fn finish(
        &self,
        session_id: Uuid,
        owner_id: Uuid,
        input: FinishInput,
        extracted: AiMetrics,
    ) -> ApiResult<LiveSession> {
        input.validate()?;
        let session = self.finishable(session_id, owner_id).await?;

        let (started_at, followers_start, coins_start) =
            match (session.started_at, session.followers_start, session.coins_start) {
                (Some(at), Some(followers), Some(coins)) => (at, followers, coins),
                _ => {
                    return Err(ApiError::Internal(format!(
                        "Session {} is IN_PROGRESS without start fields",
                        session_id
                    )))
                }
            };

        let now = self.clock.now();
        let outcome = FinishOutcome::compute(
            started_at,
            now,
            followers_start,
            input.followers_end,
            coins_start,
            input.coins_end,
        );
        let ai_metrics = input.ai_metrics.clone().or(extracted);

        let mut tx = self.db.begin().await?;
        let affected = db::sessions::finish(
            &mut *tx,
            session_id,
            owner_id,
            input.followers_end,
            input.coins_end,
            &outcome,
            &ai_metrics,
            now,
        )
        .await?;
        if affected == 0 {
            return Err(lost_race(session_id));
        }
        db::activity::record(
            &mut *tx,
            owner_id,
            &ActivityDetails::Transition {
                session_id,
                from: Some(SessionStatus::InProgress),
                to: SessionStatus::Finished,
            },
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            session_id = %session_id,
            owner_id = %owner_id,
            duration_minutes = outcome.duration_minutes,
            followers_gained = outcome.followers_gained,
            coins_spent = outcome.coins_spent,
            ai_fields = !ai_metrics.is_empty(),
            "Session finished"
        );

        self.load_owned(session_id, owner_id).await
    }

    /// Edit a SCHEDULED session; a given product list replaces the old one
    pub async fn update_scheduled(
        &self,
        session_id: Uuid,
        owner_id: Uuid,
        patch: ScheduledPatch,
    ) -> ApiResult<SessionWithProducts> {
        patch.validate()?;
        let session = self.load_owned(session_id, owner_id).await?;
        require_status(&session, SessionStatus::Scheduled)?;

        let now = self.clock.now();
        let mut patch = patch;
        patch.title = patch.title.map(|t| t.trim().to_string());

        let mut fields = Vec::new();
        if patch.title.is_some() {
            fields.push("title".to_string());
        }
        if patch.scheduled_at.is_some() {
            fields.push("scheduledAt".to_string());
        }
        if patch.description.is_some() {
            fields.push("description".to_string());
        }
        if patch.products.is_some() {
            fields.push("products".to_string());
        }

        let mut tx = self.db.begin().await?;
        let affected = db::sessions::update_scheduled(&mut *tx, session_id, owner_id, &patch, now).await?;
        if affected == 0 {
            return Err(lost_race(session_id));
        }
        if let Some(products) = &patch.products {
            db::sessions::delete_products(&mut *tx, session_id).await?;
            db::sessions::insert_products(&mut tx, session_id, products).await?;
        }
        db::activity::record(
            &mut *tx,
            owner_id,
            &ActivityDetails::Update {
                entity: EntityKind::ScheduledSession,
                entity_id: session_id,
                fields,
            },
            now,
        )
        .await?;
        tx.commit().await?;

        info!(session_id = %session_id, owner_id = %owner_id, "Scheduled session updated");

        self.get(session_id, owner_id).await
    }

    /// Remove a session that never went live
    pub async fn delete_scheduled(&self, session_id: Uuid, owner_id: Uuid) -> ApiResult<()> {
        let session = self.load_owned(session_id, owner_id).await?;
        require_status(&session, SessionStatus::Scheduled)?;

        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        let affected = db::sessions::delete_scheduled(&mut *tx, session_id, owner_id).await?;
        if affected == 0 {
            return Err(lost_race(session_id));
        }
        db::activity::record(
            &mut *tx,
            owner_id,
            &ActivityDetails::Delete {
                entity: EntityKind::ScheduledSession,
                entity_id: session_id,
            },
            now,
        )
        .await?;
        tx.commit().await?;

        info!(session_id = %session_id, owner_id = %owner_id, "Scheduled session deleted");
        Ok(())
    }
}
