//! Live session state machine
//!
//! A session moves SCHEDULED → IN_PROGRESS → FINISHED, or is deleted while
//! still SCHEDULED. Nothing leaves FINISHED. `started_at` is set exactly
//! when the status is IN_PROGRESS or FINISHED; `finished_at` exactly when
//! FINISHED.

use chrono::{DateTime, Utc};
use lsa_common::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Scheduled,
    InProgress,
    Finished,
    /// Reserved for sessions abandoned by external tooling; no operation here
    /// transitions into it.
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "SCHEDULED",
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Finished => "FINISHED",
            SessionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "SCHEDULED" => Ok(SessionStatus::Scheduled),
            "IN_PROGRESS" => Ok(SessionStatus::InProgress),
            "FINISHED" => Ok(SessionStatus::Finished),
            "CANCELLED" => Ok(SessionStatus::Cancelled),
            other => Err(Error::Internal(format!("Unknown session status: {}", other))),
        }
    }

    /// Whether the lifecycle permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Scheduled, SessionStatus::InProgress)
                | (SessionStatus::InProgress, SessionStatus::Finished)
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One live-selling broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSession {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: SessionStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub followers_start: Option<i64>,
    pub followers_end: Option<i64>,
    pub coins_start: Option<f64>,
    pub coins_end: Option<f64>,
    pub duration_minutes: Option<i64>,
    /// May be negative: a follower loss during the live is preserved.
    pub followers_gained: Option<i64>,
    /// May be negative: a coin top-up during the live is preserved.
    pub coins_spent: Option<f64>,
    pub live_link: Option<String>,
    pub peak_viewers: Option<i64>,
    pub chat_interactions: Option<i64>,
    pub notes: Option<String>,
    pub likes: Option<i64>,
    pub shares: Option<i64>,
    pub comments: Option<i64>,
    pub views: Option<i64>,
    pub engagement_rate: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product planned for a scheduled session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProduct {
    pub id: Uuid,
    pub session_id: Uuid,
    pub name: String,
    pub price: Option<f64>,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionWithProducts {
    #[serde(flatten)]
    pub session: LiveSession,
    pub products: Vec<SessionProduct>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionProduct {
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
}

impl NewSessionProduct {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("Product name must not be empty".to_string()));
        }
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "Product price must be a non-negative amount: {}",
                    price
                )));
            }
        }
        Ok(())
    }
}

/// Input for scheduling a future session
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInput {
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub products: Vec<NewSessionProduct>,
}

impl ScheduleInput {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("Title must not be empty".to_string()));
        }
        self.products.iter().try_for_each(NewSessionProduct::validate)
    }
}

/// Partial update of a scheduled session
///
/// A present `products` list replaces every previously scheduled product.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub products: Option<Vec<NewSessionProduct>>,
}

impl ScheduledPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(Error::InvalidInput("Title must not be empty".to_string()));
            }
        }
        match &self.products {
            Some(products) => products.iter().try_for_each(NewSessionProduct::validate),
            None => Ok(()),
        }
    }
}

/// Input for going live
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartInput {
    pub followers_start: i64,
    pub coins_start: f64,
    #[serde(default)]
    pub live_link: Option<String>,
    /// Promote this scheduled session instead of creating a new one
    #[serde(default)]
    pub scheduled_session_id: Option<Uuid>,
}

impl StartInput {
    pub fn validate(&self) -> Result<()> {
        if self.followers_start < 0 {
            return Err(Error::InvalidInput(format!(
                "followersStart must be non-negative: {}",
                self.followers_start
            )));
        }
        validate_coins("coinsStart", self.coins_start)
    }
}

/// Partial update while live
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePatch {
    #[serde(default)]
    pub peak_viewers: Option<i64>,
    #[serde(default)]
    pub chat_interactions: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl LivePatch {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("peakViewers", self.peak_viewers),
            ("chatInteractions", self.chat_interactions),
        ] {
            if let Some(v) = value {
                if v < 0 {
                    return Err(Error::InvalidInput(format!(
                        "{} must be non-negative: {}",
                        field, v
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.peak_viewers.is_none() && self.chat_interactions.is_none() && self.notes.is_none()
    }
}

/// Counters extracted by the AI service from end-of-live screenshots
///
/// Only fields actually present are merged into the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiMetrics {
    #[serde(default)]
    pub likes: Option<i64>,
    #[serde(default)]
    pub shares: Option<i64>,
    #[serde(default)]
    pub comments: Option<i64>,
    #[serde(default)]
    pub views: Option<i64>,
    #[serde(default)]
    pub engagement_rate: Option<f64>,
}

impl AiMetrics {
    /// Fill fields missing from `self` with those present in `fallback`
    pub fn or(self, fallback: AiMetrics) -> AiMetrics {
        AiMetrics {
            likes: self.likes.or(fallback.likes),
            shares: self.shares.or(fallback.shares),
            comments: self.comments.or(fallback.comments),
            views: self.views.or(fallback.views),
            engagement_rate: self.engagement_rate.or(fallback.engagement_rate),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == AiMetrics::default()
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("likes", self.likes),
            ("shares", self.shares),
            ("comments", self.comments),
            ("views", self.views),
        ] {
            if let Some(v) = value {
                if v < 0 {
                    return Err(Error::InvalidInput(format!(
                        "{} must be non-negative: {}",
                        field, v
                    )));
                }
            }
        }
        if let Some(rate) = self.engagement_rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "engagementRate must be a non-negative number: {}",
                    rate
                )));
            }
        }
        Ok(())
    }
}

/// Input for ending a live
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishInput {
    pub followers_end: i64,
    pub coins_end: f64,
    #[serde(flatten)]
    pub ai_metrics: AiMetrics,
}

impl FinishInput {
    pub fn validate(&self) -> Result<()> {
        if self.followers_end < 0 {
            return Err(Error::InvalidInput(format!(
                "followersEnd must be non-negative: {}",
                self.followers_end
            )));
        }
        validate_coins("coinsEnd", self.coins_end)?;
        self.ai_metrics.validate()
    }
}

/// Fields computed at the IN_PROGRESS → FINISHED transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinishOutcome {
    pub duration_minutes: i64,
    pub followers_gained: i64,
    pub coins_spent: f64,
}

impl FinishOutcome {
    /// Compute finish fields
    ///
    /// Duration is floored to whole minutes. Deltas are not clamped.
    pub fn compute(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        followers_start: i64,
        followers_end: i64,
        coins_start: f64,
        coins_end: f64,
    ) -> Self {
        let elapsed_ms = (finished_at - started_at).num_milliseconds();
        Self {
            duration_minutes: elapsed_ms.div_euclid(60_000),
            followers_gained: followers_end - followers_start,
            coins_spent: coins_start - coins_end,
        }
    }
}

fn validate_coins(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidInput(format!(
            "{} must be a non-negative amount: {}",
            field, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_only_forward_transitions_allowed() {
        use SessionStatus::*;
        let all = [Scheduled, InProgress, Finished, Cancelled];
        for from in all {
            for to in all {
                let expected = matches!((from, to), (Scheduled, InProgress) | (InProgress, Finished));
                assert_eq!(from.can_transition_to(to), expected, "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_status_round_trips_through_storage_names() {
        for status in [
            SessionStatus::Scheduled,
            SessionStatus::InProgress,
            SessionStatus::Finished,
            SessionStatus::Cancelled,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(SessionStatus::parse("PAUSED").is_err());
    }

    #[test]
    fn test_status_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
    }

    #[test]
    fn test_finish_outcome_forty_five_minutes() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();
        let outcome = FinishOutcome::compute(start, start + Duration::minutes(45), 1000, 1200, 50.0, 10.0);
        assert_eq!(outcome.duration_minutes, 45);
        assert_eq!(outcome.followers_gained, 200);
        assert_eq!(outcome.coins_spent, 40.0);
    }

    #[test]
    fn test_finish_outcome_floors_partial_minutes() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();
        let outcome = FinishOutcome::compute(start, start + Duration::seconds(119), 0, 0, 0.0, 0.0);
        assert_eq!(outcome.duration_minutes, 1);
    }

    #[test]
    fn test_finish_outcome_preserves_negative_deltas() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();
        let outcome = FinishOutcome::compute(start, start + Duration::minutes(10), 500, 480, 10.0, 25.0);
        assert_eq!(outcome.followers_gained, -20);
        assert_eq!(outcome.coins_spent, -15.0);
    }

    #[test]
    fn test_ai_metrics_explicit_fields_win() {
        let explicit = AiMetrics {
            likes: Some(10),
            ..Default::default()
        };
        let extracted = AiMetrics {
            likes: Some(99),
            views: Some(500),
            ..Default::default()
        };
        let merged = explicit.or(extracted);
        assert_eq!(merged.likes, Some(10));
        assert_eq!(merged.views, Some(500));
        assert_eq!(merged.shares, None);
    }

    #[test]
    fn test_start_input_validation() {
        let input = StartInput {
            followers_start: -1,
            coins_start: 0.0,
            live_link: None,
            scheduled_session_id: None,
        };
        assert!(input.validate().is_err());

        let input = StartInput {
            followers_start: 10,
            coins_start: f64::NAN,
            live_link: None,
            scheduled_session_id: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_finish_input_deserializes_flat_ai_fields() {
        let input: FinishInput = serde_json::from_str(
            r#"{"followersEnd": 1200, "coinsEnd": 10.0, "likes": 300, "engagementRate": null}"#,
        )
        .unwrap();
        assert_eq!(input.ai_metrics.likes, Some(300));
        assert_eq!(input.ai_metrics.engagement_rate, None);
    }
}
