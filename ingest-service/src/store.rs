//! PostgreSQL storage layer.
//!
//! This module owns every statement the service issues:
//! - the allow-list loader (read once at startup),
//! - the user registrar,
//! - the event recorder,
//! - the restriction lift driven by verified Slack callbacks.
//!
//! The registrar's origin transition is written as a single conditional
//! upsert guarded by the unique constraint on `slack_id`, so two
//! concurrent registrations for the same identity resolve to one insert
//! and one detected conflict rather than a silent duplicate.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Row};
use tracing::info;

use crate::error::AppError;

/// Origin value for an identity whose join channel is not yet known.
pub const UNKNOWN_ORIGIN: &str = "unknown";

/// Timezone value used until the messaging platform reports a real one.
pub const DEFAULT_TIMEZONE: &str = "unknown/unknown";

/// Event names that land in `single_entry_events` instead of `events`.
///
/// These are once-per-user milestones; everything else in the allow-list
/// accumulates in the multi-entry table.
const SINGLE_ENTRY_EVENTS: &[&str] = &["onboarding_completed", "first_login"];

/// Connect to PostgreSQL and verify the connection with a ping.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await?;

    ping(&pool).await?;

    info!(max_connections = max_connections, "database_pool_ready");

    Ok(pool)
}

/// Liveness probe used by the health endpoint.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

// =============================================================================
// Allow-list
// =============================================================================

/// Destination table for a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTable {
    /// Rows accumulate across repeated calls.
    Multi,
    /// Once-per-user milestone rows.
    Single,
}

impl EventTable {
    pub fn name(&self) -> &'static str {
        match self {
            EventTable::Multi => "events",
            EventTable::Single => "single_entry_events",
        }
    }
}

/// The set of permitted event names, split by destination table.
///
/// Loaded once at startup and treated as immutable for the process
/// lifetime; there is no hot-reload.
#[derive(Debug, Clone)]
pub struct AllowedEvents {
    multi: HashSet<String>,
    single: HashSet<String>,
}

impl AllowedEvents {
    /// Build the allow-list from an explicit set of multi-entry names.
    pub fn from_names(multi: impl IntoIterator<Item = String>) -> Self {
        Self {
            multi: multi.into_iter().collect(),
            single: SINGLE_ENTRY_EVENTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Load the configured multi-entry event names from storage.
    ///
    /// Any query or row-decode failure aborts the whole load; the caller
    /// never sees a partial set.
    pub async fn load(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let rows = sqlx::query("SELECT event_name FROM allowed_events")
            .fetch_all(pool)
            .await?;

        let multi = rows
            .iter()
            .map(|row| row.try_get::<String, _>("event_name"))
            .collect::<Result<HashSet<_>, _>>()?;

        info!(allowed_events = multi.len(), "allow_list_loaded");

        Ok(Self::from_names(multi))
    }

    /// Classify an event name into its destination table.
    ///
    /// The lists are disjoint by contract; should an operator configure
    /// a name in both, multi-entry membership wins. Returns `None` when
    /// the name is in neither list, in which case the event must be
    /// rejected before any write.
    pub fn classify(&self, event_name: &str) -> Option<EventTable> {
        if self.multi.contains(event_name) {
            Some(EventTable::Multi)
        } else if self.single.contains(event_name) {
            Some(EventTable::Single)
        } else {
            None
        }
    }
}

// =============================================================================
// User registrar
// =============================================================================

/// A registration request after JSON decoding, before defaulting.
#[derive(Debug, Clone)]
pub struct UserRegistration {
    pub slack_id: String,
    pub join_date: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub join_origin: Option<String>,
    pub is_restricted: bool,
}

/// Insert a fresh row for a defaulted ("unknown") origin. An existing
/// row, whatever its origin, makes this a duplicate registration.
const REGISTER_NEW_USER: &str = r#"
    INSERT INTO users (slack_id, join_date, timezone, join_origin, is_restricted)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (slack_id) DO NOTHING
"#;

/// Insert or promote for a concrete origin. Inserts when the identity
/// is new, sets the origin when it is still "unknown", and matches
/// nothing when a concrete origin is already held. The update arm sets
/// only `join_origin`; timezone and restriction flags stay untouched.
const PROMOTE_JOIN_ORIGIN: &str = r#"
    INSERT INTO users (slack_id, join_date, timezone, join_origin, is_restricted)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (slack_id) DO UPDATE
    SET join_origin = EXCLUDED.join_origin
    WHERE users.join_origin = 'unknown'
"#;

/// Pick the registration statement for an incoming (defaulted) origin.
///
/// Both statements take the same binds in the same order; only the
/// conflict arm differs.
fn registration_statement(join_origin: &str) -> &'static str {
    if join_origin == UNKNOWN_ORIGIN {
        REGISTER_NEW_USER
    } else {
        PROMOTE_JOIN_ORIGIN
    }
}

/// Interpret the affected-row count of a registration statement.
///
/// Zero rows means the identity already holds a registration decision
/// that this call may not repeat.
fn registration_outcome(rows_affected: u64) -> Result<(), AppError> {
    if rows_affected == 0 {
        Err(AppError::AlreadyRegistered)
    } else {
        Ok(())
    }
}

/// Register an identity, or transition its join origin exactly once.
///
/// With a defaulted ("unknown") origin this inserts a fresh row and
/// treats any existing row as a duplicate registration. With a concrete
/// origin it inserts the row if absent or promotes an existing
/// "unknown" origin, and conflicts when a concrete origin is already
/// set. Timezone and restriction flags on an existing row are never
/// touched here; those belong to the Slack relay.
pub async fn register_user(pool: &PgPool, reg: UserRegistration) -> Result<(), AppError> {
    if reg.slack_id.is_empty() {
        return Err(AppError::InvalidPayload(
            "slack_id must not be empty".to_string(),
        ));
    }

    let join_date = reg.join_date.unwrap_or_else(Utc::now);
    let timezone = reg.timezone.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    let join_origin = reg
        .join_origin
        .unwrap_or_else(|| UNKNOWN_ORIGIN.to_string());

    let result = sqlx::query(registration_statement(&join_origin))
        .bind(&reg.slack_id)
        .bind(join_date)
        .bind(&timezone)
        .bind(&join_origin)
        .bind(reg.is_restricted)
        .execute(pool)
        .await?;

    registration_outcome(result.rows_affected())?;

    info!(slack_id = %reg.slack_id, join_origin = %join_origin, "user_registered");

    Ok(())
}

// =============================================================================
// Event recorder
// =============================================================================

/// An instrumentation event after JSON decoding, before defaulting.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub slack_id: String,
    pub event_name: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
}

/// Append one event row to its destination table.
///
/// Rejects before any write when the name is in neither allow-list.
/// There is no update path; every call is exactly one new row or one
/// rejection.
pub async fn record_event(
    pool: &PgPool,
    allowed: &AllowedEvents,
    record: EventRecord,
) -> Result<(), AppError> {
    if record.slack_id.is_empty() || record.event_name.is_empty() {
        return Err(AppError::InvalidPayload(
            "slack_id and event_name must not be empty".to_string(),
        ));
    }

    let table = allowed
        .classify(&record.event_name)
        .ok_or_else(|| AppError::InvalidPayload("invalid event name provided".to_string()))?;

    let event_time = record.timestamp.unwrap_or_else(Utc::now);

    // Table names come from EventTable, never from the request.
    let statement = format!(
        "INSERT INTO {} (event_time, slack_id, event_name, metadata) VALUES ($1, $2, $3, $4)",
        table.name()
    );

    sqlx::query(&statement)
        .bind(event_time)
        .bind(&record.slack_id)
        .bind(&record.event_name)
        .bind(Json(&record.metadata))
        .execute(pool)
        .await?;

    info!(
        slack_id = %record.slack_id,
        event_name = %record.event_name,
        table = table.name(),
        "event_recorded"
    );

    Ok(())
}

// =============================================================================
// Restriction lift
// =============================================================================

/// Apply a restriction lift reported by the messaging platform.
///
/// The update only fires while the stored flag is still true, so a
/// repeated notification is a no-op rather than a redundant write.
/// Returns whether a row was actually updated.
pub async fn lift_restriction(
    pool: &PgPool,
    slack_id: &str,
    timezone: &str,
    is_restricted: bool,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET timezone = $1, is_restricted = $2
        WHERE slack_id = $3 AND is_restricted = TRUE
        "#,
    )
    .bind(timezone)
    .bind(is_restricted)
    .bind(slack_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
