//! HTTP API handlers

pub mod activity;
pub mod auth;
pub mod health;
pub mod reports;
pub mod sessions;
pub mod training;

pub use activity::activity_routes;
pub use auth::{identity_middleware, Caller, USER_ID_HEADER};
pub use health::health_routes;
pub use reports::report_routes;
pub use sessions::session_routes;
pub use training::training_routes;
