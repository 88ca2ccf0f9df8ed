// sentinel-store-sqlite/src/convert.rs
// ============================================================================
// Module: SQLite Row Conversions
// Description: String encodings for the closed enums persisted as TEXT
// columns, and JSON (de)serialization helpers for BLOB columns.
// Purpose: Keep the wire-stable snake_case rendering (shared with JSON) as
// the on-disk encoding too, so a dumped row is human-readable.
// Dependencies: sentinel-core, sentinel-contract, serde_json
// ============================================================================

use sentinel_contract::SentinelError;
use sentinel_contract::SessionStatus;
use sentinel_contract::SourceType;
use sentinel_core::EventType;
use sentinel_core::Severity;

use crate::SqliteStoreError;

pub fn severity_as_str(value: Severity) -> &'static str {
    match value {
        Severity::Debug => "debug",
        Severity::Info => "info",
        Severity::Warn => "warn",
        Severity::Error => "error",
        Severity::Critical => "critical",
    }
}

pub fn severity_from_str(value: &str) -> Result<Severity, SqliteStoreError> {
    match value {
        "debug" => Ok(Severity::Debug),
        "info" => Ok(Severity::Info),
        "warn" => Ok(Severity::Warn),
        "error" => Ok(Severity::Error),
        "critical" => Ok(Severity::Critical),
        other => Err(SqliteStoreError::Corrupt(format!("unknown severity {other:?}"))),
    }
}

pub fn event_type_as_str(value: EventType) -> &'static str {
    value.as_str()
}

pub fn event_type_from_str(value: &str) -> Result<EventType, SqliteStoreError> {
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
        other => Err(SqliteStoreError::Corrupt(format!("unknown event_type {other:?}"))),
    }
}

pub fn session_status_as_str(value: SessionStatus) -> &'static str {
    match value {
        SessionStatus::Active => "active",
        SessionStatus::Completed => "completed",
        SessionStatus::Error => "error",
    }
}

pub fn session_status_from_str(value: &str) -> Result<SessionStatus, SqliteStoreError> {
    match value {
        "active" => Ok(SessionStatus::Active),
        "completed" => Ok(SessionStatus::Completed),
        "error" => Ok(SessionStatus::Error),
        other => Err(SqliteStoreError::Corrupt(format!("unknown session status {other:?}"))),
    }
}

pub fn source_type_as_str(value: SourceType) -> &'static str {
    match value {
        SourceType::Event => "event",
        SourceType::Session => "session",
        SourceType::Lesson => "lesson",
    }
}

pub fn source_type_from_str(value: &str) -> Result<SourceType, SqliteStoreError> {
    match value {
        "event" => Ok(SourceType::Event),
        "session" => Ok(SourceType::Session),
        "lesson" => Ok(SourceType::Lesson),
        other => Err(SqliteStoreError::Corrupt(format!("unknown source_type {other:?}"))),
    }
}

impl From<SqliteStoreError> for SentinelError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
            SqliteStoreError::HashChain(message) => Self::HashChain(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
            SqliteStoreError::Corrupt(message) | SqliteStoreError::Db(message) | SqliteStoreError::Io(message) => {
                Self::Unavailable(message)
            }
        }
    }
}
