use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tidewire_core::{AppResult, TenantId};

/// Stored viewer bearer token. Only the SHA-256 hash of the token is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerTokenRecord {
    /// Hex SHA-256 of the raw token.
    pub token_hash: String,
    /// Home tenant of the viewer.
    pub tenant_id: TenantId,
    /// Stable subject claim.
    pub subject: String,
    /// Human readable name.
    pub display_name: String,
    /// Tenant a privileged viewer acts in, overriding the home tenant.
    pub acting_tenant_id: Option<TenantId>,
    /// Expiry; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Repository port for viewer tokens.
#[async_trait]
pub trait ViewerTokenRepository: Send + Sync {
    /// Stores a token record, replacing any record with the same hash.
    async fn save_token(&self, record: ViewerTokenRecord) -> AppResult<()>;

    /// Returns the record stored for a token hash.
    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<ViewerTokenRecord>>;
}
