//! Manual and AI-assisted report entry

use chrono::{DateTime, Utc};
use lsa_common::Clock;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    ActivityDetails, EntityKind, LiveReport, ReportDetail, ReportInput, SessionStatus,
};

pub struct ReportEditor {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl ReportEditor {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn get(&self, report_id: Uuid, owner_id: Uuid) -> ApiResult<ReportDetail> {
        let report = db::reports::get_owned(&self.db, report_id, owner_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Report not found: {}", report_id)))?;
        let products = db::products::list_for_report(&self.db, report_id).await?;
        let traffic_sources = db::reports::list_traffic_sources(&self.db, report_id).await?;

        Ok(ReportDetail {
            metrics: report.metrics(),
            report,
            products,
            traffic_sources,
        })
    }

    /// A linked session must be the caller's, FINISHED, and not yet reported
    async fn check_session_link(&self, input: &ReportInput, owner_id: Uuid, report_id: Option<Uuid>) -> ApiResult<()> {
        let Some(session_id) = input.session_id else {
            return Ok(());
        };

        let session = db::sessions::get_owned(&self.db, session_id, owner_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Session not found: {}", session_id)))?;
        if session.status != SessionStatus::Finished {
            return Err(ApiError::Conflict(format!(
                "Session {} is {}, only FINISHED sessions can be reported",
                session_id, session.status
            )));
        }
        if db::reports::session_has_report(&self.db, session_id, report_id).await? {
            return Err(ApiError::Conflict(format!(
                "Session {} already has a report",
                session_id
            )));
        }
        Ok(())
    }

    async fn write(&self, report: &LiveReport, input: &ReportInput, details: ActivityDetails) -> ApiResult<()> {
        let mut tx = self.db.begin().await?;
        // The unique index on session_id settles a concurrent link race here.
        db::reports::upsert_report(&mut tx, report).await?;
        db::products::replace_lines(&mut tx, report.id, &input.products).await?;
        db::reports::replace_traffic_sources(&mut tx, report.id, &input.traffic_sources).await?;
        db::products::prune_orphan_groups(&mut tx, report.owner_id).await?;
        db::products::refresh_member_counts(&mut tx, report.owner_id).await?;
        db::activity::record(&mut *tx, report.owner_id, &details, report.updated_at).await?;
        tx.commit().await?;
        Ok(())
    }

    fn build(
        report_id: Uuid,
        owner_id: Uuid,
        input: &ReportInput,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> LiveReport {
        LiveReport {
            id: report_id,
            owner_id,
            session_id: input.session_id,
            store: input.store.trim().to_string(),
            report_date: input.report_date,
            live_title: input.live_title.trim().to_string(),
            live_duration_seconds: input.live_duration_seconds,
            counters: input.counters,
            coins_cost: input.counters.coins_cost(),
            conversion_rate: input.conversion_rate,
            entry_source: input.entry_source,
            created_at,
            updated_at: now,
        }
    }

    pub async fn create(&self, owner_id: Uuid, input: ReportInput) -> ApiResult<ReportDetail> {
        input.validate()?;
        self.check_session_link(&input, owner_id, None).await?;

        let now = self.clock.now();
        let report = Self::build(Uuid::new_v4(), owner_id, &input, now, now);
        self.write(
            &report,
            &input,
            ActivityDetails::Create {
                entity: EntityKind::Report,
                entity_id: report.id,
            },
        )
        .await?;

        info!(
            report_id = %report.id,
            owner_id = %owner_id,
            session_id = ?report.session_id,
            entry_source = report.entry_source.as_str(),
            products = input.products.len(),
            "Report created"
        );

        self.get(report.id, owner_id).await
    }

    /// Replace a report's contents; product lines are recreated ungrouped
    pub async fn update(&self, report_id: Uuid, owner_id: Uuid, input: ReportInput) -> ApiResult<ReportDetail> {
        input.validate()?;
        let existing = db::reports::get_owned(&self.db, report_id, owner_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Report not found: {}", report_id)))?;
        self.check_session_link(&input, owner_id, Some(report_id)).await?;

        let now = self.clock.now();
        let report = Self::build(report_id, owner_id, &input, existing.created_at, now);
        self.write(
            &report,
            &input,
            ActivityDetails::Update {
                entity: EntityKind::Report,
                entity_id: report_id,
                fields: vec!["*".to_string()],
            },
        )
        .await?;

        info!(report_id = %report_id, owner_id = %owner_id, "Report updated");

        self.get(report_id, owner_id).await
    }

    pub async fn delete(&self, report_id: Uuid, owner_id: Uuid) -> ApiResult<()> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        let affected = db::reports::delete_report(&mut *tx, report_id, owner_id).await?;
        if affected == 0 {
            return Err(ApiError::NotFound(format!("Report not found: {}", report_id)));
        }
        db::products::prune_orphan_groups(&mut tx, owner_id).await?;
        db::products::refresh_member_counts(&mut tx, owner_id).await?;
        db::activity::record(
            &mut *tx,
            owner_id,
            &ActivityDetails::Delete {
                entity: EntityKind::Report,
                entity_id: report_id,
            },
            now,
        )
        .await?;
        tx.commit().await?;

        info!(report_id = %report_id, owner_id = %owner_id, "Report deleted");
        Ok(())
    }
}
