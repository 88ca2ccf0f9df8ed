// sentinel-ingest/src/auth.rs
// ============================================================================
// Module: Bearer Authentication
// Description: Extracts and verifies the `Authorization: Bearer
// al_<live|test>_<32 chars>` header (§6 "Auth").
// Purpose: Give every handler a `TenantScope` without repeating the
// prefix-lookup and constant-time compare at each call site.
// Dependencies: axum, sentinel-core
// ============================================================================

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sentinel_core::AgentId;
use sentinel_core::ApiKeyId;
use sentinel_core::Instant;
use sentinel_core::TenantId;
use sentinel_core::TenantScope;
use sentinel_core::apikey;

use crate::error::IngestError;
use crate::state::AppState;

/// Length of the prefix [`apikey::mint`] reserves for fast lookup.
const KEY_PREFIX_LEN: usize = 16;

/// A verified caller: the tenant scope their key is bound to, plus the key
/// identity for `last_used_at` bookkeeping.
#[derive(Debug, Clone)]
pub struct AuthenticatedTenant {
    /// Tenant scope every downstream storage call is bound to.
    pub scope: TenantScope,
    /// Identifier of the key that authenticated this request.
    pub key_id: ApiKeyId,
    /// Scopes granted to the presented key.
    pub granted_scopes: Vec<String>,
}

impl AuthenticatedTenant {
    /// True when the key carries `scope` (exact match; this workspace does
    /// not model scope hierarchies).
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.granted_scopes.iter().any(|granted| granted == scope)
    }
}

impl FromRequestParts<AppState> for AuthenticatedTenant {
    type Rejection = IngestError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(axum::http::header::AUTHORIZATION).ok_or(IngestError::MissingCredential)?;
        let header = header.to_str().map_err(|_invalid_ascii| IngestError::MissingCredential)?;
        let presented = header.strip_prefix("Bearer ").ok_or(IngestError::MissingCredential)?;
        if presented.len() < KEY_PREFIX_LEN {
            return Err(IngestError::InvalidCredential);
        }
        let prefix = &presented[..KEY_PREFIX_LEN];

        let record = state.api_keys.find_by_prefix(prefix).map_err(|err| IngestError::Store(sentinel_contract::SentinelError::Unavailable(err.to_string())))?.ok_or(IngestError::InvalidCredential)?;
        if record.is_revoked() {
            return Err(IngestError::InvalidCredential);
        }
        if !apikey::verify(presented, &record.secret_hash) {
            return Err(IngestError::InvalidCredential);
        }

        let _ = state.api_keys.mark_used(&record.tenant_id, &record.id, &Instant::now());
        Ok(Self { scope: TenantScope::new(record.tenant_id), key_id: record.id, granted_scopes: record.scopes })
    }
}

/// Resolves the agent id an authenticated request acts as, when the caller
/// supplies one. Kept here (rather than inline in each handler) because
/// every route that accepts an `agentId` query/body field applies the same
/// "absent means unscoped" rule.
#[must_use]
pub fn optional_agent_id(raw: Option<String>) -> Option<AgentId> {
    raw.map(AgentId::new)
}
