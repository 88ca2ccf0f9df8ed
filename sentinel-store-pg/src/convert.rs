// sentinel-store-pg/src/convert.rs
// ============================================================================
// Module: Postgres Row Conversions
// Description: String encodings for the closed enums persisted as TEXT
// columns, and the error-taxonomy mapping from `PgStoreError` onto
// `SentinelError`.
// Purpose: Keep the wire-stable snake_case rendering (shared with JSON) as
// the on-disk encoding too, matching the embedded backend's convention.
// Dependencies: sentinel-core, sentinel-contract
// ============================================================================

use sentinel_contract::SentinelError;
use sentinel_contract::SessionStatus;
use sentinel_contract::SourceType;
use sentinel_core::EventType;
use sentinel_core::Severity;

use crate::store::PgStoreError;

/// Renders a [`Severity`] as the lowercase string stored in the `severity`
/// column.
#[must_use]
pub fn severity_as_str(value: Severity) -> &'static str {
    match value {
        Severity::Debug => "debug",
        Severity::Info => "info",
        Severity::Warn => "warn",
        Severity::Error => "error",
        Severity::Critical => "critical",
    }
}

/// Parses a `severity` column value back into a [`Severity`].
///
/// # Errors
///
/// Returns [`PgStoreError::Corrupt`] when `value` is not a recognized
/// severity string.
pub fn severity_from_str(value: &str) -> Result<Severity, PgStoreError> {
    match value {
        "debug" => Ok(Severity::Debug),
        "info" => Ok(Severity::Info),
        "warn" => Ok(Severity::Warn),
        "error" => Ok(Severity::Error),
        "critical" => Ok(Severity::Critical),
        other => Err(PgStoreError::Corrupt(format!("unknown severity {other:?}"))),
    }
}

/// Renders an [`EventType`] as the string stored in the `event_type` column.
#[must_use]
pub fn event_type_as_str(value: EventType) -> &'static str {
    value.as_str()
}

/// Parses an `event_type` column value back into an [`EventType`].
///
/// # Errors
///
/// Returns [`PgStoreError::Corrupt`] when `value` is not a recognized event
/// type string.
pub fn event_type_from_str(value: &str) -> Result<EventType, PgStoreError> {
    match value {
        "session_started" => Ok(EventType::SessionStarted),
        "session_ended" => Ok(EventType::SessionEnded),
        "tool_call" => Ok(EventType::ToolCall),
        "tool_response" => Ok(EventType::ToolResponse),
        "tool_error" => Ok(EventType::ToolError),
        "approval_requested" => Ok(EventType::ApprovalRequested),
        "approval_granted" => Ok(EventType::ApprovalGranted),
        "approval_denied" => Ok(EventType::ApprovalDenied),
        "form_presented" => Ok(EventType::FormPresented),
        "form_submitted" => Ok(EventType::FormSubmitted),
        "cost_tracked" => Ok(EventType::CostTracked),
        "llm_call" => Ok(EventType::LlmCall),
        "llm_response" => Ok(EventType::LlmResponse),
        "alert_triggered" => Ok(EventType::AlertTriggered),
        "alert_resolved" => Ok(EventType::AlertResolved),
        "custom" => Ok(EventType::Custom),
        other => Err(PgStoreError::Corrupt(format!("unknown event_type {other:?}"))),
    }
}

/// Renders a [`SessionStatus`] as the lowercase string stored in the
/// `status` column.
#[must_use]
pub fn session_status_as_str(value: SessionStatus) -> &'static str {
    match value {
        SessionStatus::Active => "active",
        SessionStatus::Completed => "completed",
        SessionStatus::Error => "error",
    }
}

/// Parses a `status` column value back into a [`SessionStatus`].
///
/// # Errors
///
/// Returns [`PgStoreError::Corrupt`] when `value` is not a recognized status
/// string.
pub fn session_status_from_str(value: &str) -> Result<SessionStatus, PgStoreError> {
    match value {
        "active" => Ok(SessionStatus::Active),
        "completed" => Ok(SessionStatus::Completed),
        "error" => Ok(SessionStatus::Error),
        other => Err(PgStoreError::Corrupt(format!("unknown session status {other:?}"))),
    }
}

/// Renders a [`SourceType`] as the lowercase string stored in the
/// `source_type` column.
#[must_use]
pub fn source_type_as_str(value: SourceType) -> &'static str {
    match value {
        SourceType::Event => "event",
        SourceType::Session => "session",
        SourceType::Lesson => "lesson",
    }
}

/// Parses a `source_type` column value back into a [`SourceType`].
///
/// # Errors
///
/// Returns [`PgStoreError::Corrupt`] when `value` is not a recognized source
/// type string.
pub fn source_type_from_str(value: &str) -> Result<SourceType, PgStoreError> {
    match value {
        "event" => Ok(SourceType::Event),
        "session" => Ok(SourceType::Session),
        "lesson" => Ok(SourceType::Lesson),
        other => Err(PgStoreError::Corrupt(format!("unknown source_type {other:?}"))),
    }
}

impl From<PgStoreError> for SentinelError {
    fn from(error: PgStoreError) -> Self {
        match error {
            PgStoreError::NotFound(message) => Self::NotFound(message),
            PgStoreError::HashChain(message) => Self::HashChain(message),
            PgStoreError::Conflict(message) => Self::Conflict(message),
            PgStoreError::Corrupt(message) | PgStoreError::Db(message) => Self::Unavailable(message),
        }
    }
}
