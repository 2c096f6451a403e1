//! Data models for the live-selling analytics service
//!
//! - Live session lifecycle state machine
//! - Performance reports and their product lines
//! - Canonical product groups produced by deduplication
//! - Training progress consulted by the start gate
//! - Typed activity log payloads

pub mod activity;
pub mod product;
pub mod report;
pub mod session;
pub mod training;

pub use activity::{ActivityDetails, ActivityEntry, EntityKind};
pub use product::{
    DedupResult, MergeGroup, MergedGroupSummary, ProductLine, ProductLineInput, ProductSummary,
    UndoResult,
};
pub use report::{
    EntrySource, LiveReport, ReportCounters, ReportDetail, ReportInput, ReportMetrics, ReportRow,
    TrafficSource, COIN_UNIT_COST,
};
pub use session::{
    AiMetrics, FinishInput, FinishOutcome, LiveSession, LivePatch, NewSessionProduct, ScheduleInput,
    ScheduledPatch, SessionProduct, SessionStatus, SessionWithProducts, StartInput,
};
pub use training::{GateDecision, ModuleProgress, ModuleStatus, ModuleWithProgress, TrainingModule, UserRole};
