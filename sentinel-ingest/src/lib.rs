// sentinel-ingest/src/lib.rs
// ============================================================================
// Crate: sentinel-ingest
// Description: The HTTP ingest gateway of §4.10/§6 — bearer authentication,
// the five-step event intake pipeline, event/session/replay query, the
// guardrail CRUD surface, and the SSE live stream.
// ============================================================================

#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "test modules favour direct assertions over production error handling"
    )
)]

mod apikeys;
mod auth;
mod error;
mod router;
mod state;
mod validate;

pub use apikeys::ApiKeyStore;
pub use apikeys::ApiKeyStoreError;
pub use auth::AuthenticatedTenant;
pub use error::IngestError;
pub use router::build_router;
pub use state::AppState;
pub use validate::IncomingEvent;
pub use validate::IngestBatch;
pub use validate::validate_and_stamp;
pub use validate::validate_and_stamp_batch;
