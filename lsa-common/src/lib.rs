//! # LSA Common Library
//!
//! Shared code for the live-selling analytics service:
//! - Error and result types
//! - Bootstrap configuration and root folder resolution
//! - Logging initialization
//! - Database initialization and schema
//! - Clock abstraction and timestamp helpers
//! - Pure metric, period, and ranking computations
//! - Single-flight coordination for shared upstream calls

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod period;
pub mod ranking;
pub mod single_flight;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use period::{DateRange, PeriodSpec};
pub use ranking::Ranked;
pub use single_flight::SingleFlight;
pub use time::{Clock, ManualClock, SystemClock};
