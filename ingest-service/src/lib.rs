//! Instrumentation ingestion service.
//!
//! An HTTP endpoint that accepts authenticated user-join and
//! instrumentation events, validates event names against an allow-list,
//! and persists them to PostgreSQL. Verified Slack `user_change`
//! notifications feed restriction lifts into the same store, and status
//! lines are optionally mirrored to a Slack webhook.
//!
//! ## Request flow
//!
//! ```text
//! /instrumentation/* → API-key guard → registrar / recorder → PostgreSQL
//! /slack/events      → signature check → envelope dispatch → PostgreSQL
//! ```

pub mod config;
pub mod error;
pub mod notify;
pub mod slack;
pub mod store;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use error::AppError;
pub use notify::StatusRelay;
pub use store::{AllowedEvents, EventRecord, EventTable, UserRegistration};
pub use web::AppState;
