//! Training progress and the start gate decision

use chrono::{DateTime, Utc};
use lsa_common::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    Manager,
    Streamer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Manager => "MANAGER",
            UserRole::Streamer => "STREAMER",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "ADMIN" => Ok(UserRole::Admin),
            "MANAGER" => Ok(UserRole::Manager),
            "STREAMER" => Ok(UserRole::Streamer),
            other => Err(Error::Internal(format!("Unknown role: {}", other))),
        }
    }

    /// Roles that bypass the training requirement
    pub fn is_admin_equivalent(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Manager)
    }
}

/// Publication state of a training module; only ACTIVE modules count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModuleStatus {
    Active,
    Draft,
    Archived,
}

impl ModuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleStatus::Active => "ACTIVE",
            ModuleStatus::Draft => "DRAFT",
            ModuleStatus::Archived => "ARCHIVED",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "ACTIVE" => Ok(ModuleStatus::Active),
            "DRAFT" => Ok(ModuleStatus::Draft),
            "ARCHIVED" => Ok(ModuleStatus::Archived),
            other => Err(Error::Internal(format!("Unknown module status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingModule {
    pub id: Uuid,
    pub title: String,
    pub position: i64,
    pub status: ModuleStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleProgress {
    pub user_id: Uuid,
    pub module_id: Uuid,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A module as listed for one user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleWithProgress {
    #[serde(flatten)]
    pub module: TrainingModule,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Outcome of the training gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDecision {
    pub allowed: bool,
    pub completed: i64,
    pub total: i64,
}

impl GateDecision {
    pub fn evaluate(role: UserRole, skip_tutorial: bool, completed: i64, total: i64) -> Self {
        Self {
            allowed: role.is_admin_equivalent() || skip_tutorial || completed >= total,
            completed,
            total,
        }
    }
}
