use std::sync::Arc;

use chrono::{DateTime, Utc};
use tidewire_core::{AppError, AppResult, TenantId, UserIdentity};

use crate::signature::payload_hash;
use crate::viewer_auth_ports::{ViewerTokenRecord, ViewerTokenRepository};

/// Input for issuing one viewer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueViewerTokenInput {
    /// Home tenant.
    pub tenant_id: TenantId,
    /// Subject claim.
    pub subject: String,
    /// Display name.
    pub display_name: String,
    /// Optional acting tenant.
    pub acting_tenant_id: Option<TenantId>,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Resolves bearer tokens into viewer identities.
#[derive(Clone)]
pub struct ViewerAuthService {
    repository: Arc<dyn ViewerTokenRepository>,
}

impl ViewerAuthService {
    /// Creates a viewer auth service.
    #[must_use]
    pub fn new(repository: Arc<dyn ViewerTokenRepository>) -> Self {
        Self { repository }
    }

    /// Authenticates a raw bearer token at the current time.
    pub async fn authenticate(&self, raw_token: &str) -> AppResult<UserIdentity> {
        self.authenticate_at(raw_token, Utc::now()).await
    }

    /// Authenticates a raw bearer token at `now`.
    pub async fn authenticate_at(
        &self,
        raw_token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<UserIdentity> {
        let raw_token = raw_token.trim();
        if raw_token.is_empty() {
            return Err(AppError::Unauthorized("missing viewer token".to_owned()));
        }

        let record = self
            .repository
            .find_by_token_hash(&hash_token(raw_token))
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid viewer token".to_owned()))?;

        if record.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(AppError::Unauthorized("viewer token expired".to_owned()));
        }

        let identity = UserIdentity::new(record.subject, record.display_name, record.tenant_id);
        Ok(match record.acting_tenant_id {
            Some(acting_tenant_id) => identity.acting_as(acting_tenant_id),
            None => identity,
        })
    }

    /// Issues a new random token and returns its raw value.
    pub async fn issue_token(&self, input: IssueViewerTokenInput) -> AppResult<String> {
        let subject = input.subject.trim();
        if subject.is_empty() {
            return Err(AppError::Validation(
                "viewer token subject must not be empty".to_owned(),
            ));
        }

        let mut bytes = [0u8; 32];
        getrandom::fill(&mut bytes).map_err(|error| {
            AppError::Internal(format!("failed to generate viewer token: {error}"))
        })?;
        let raw_token = hex::encode(bytes);

        let display_name = match input.display_name.trim() {
            "" => subject.to_owned(),
            display_name => display_name.to_owned(),
        };

        self.repository
            .save_token(ViewerTokenRecord {
                token_hash: hash_token(&raw_token),
                tenant_id: input.tenant_id,
                subject: subject.to_owned(),
                display_name,
                acting_tenant_id: input.acting_tenant_id,
                expires_at: input.expires_at,
            })
            .await?;

        tracing::info!(
            tenant_id = %input.tenant_id,
            subject = %subject,
            "issued viewer token"
        );

        Ok(raw_token)
    }
}

/// Returns the stored hash for a raw token.
#[must_use]
pub fn hash_token(raw_token: &str) -> String {
    payload_hash(raw_token.trim().as_bytes())
}

#[cfg(test)]
mod tests;
