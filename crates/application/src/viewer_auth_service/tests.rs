use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tokio::sync::Mutex;

use tidewire_core::{AppError, AppResult, TenantId};

use crate::viewer_auth_ports::{ViewerTokenRecord, ViewerTokenRepository};

use super::{IssueViewerTokenInput, ViewerAuthService, hash_token};

#[derive(Default)]
struct FakeViewerTokenRepository {
    records: Mutex<HashMap<String, ViewerTokenRecord>>,
}

#[async_trait]
impl ViewerTokenRepository for FakeViewerTokenRepository {
    async fn save_token(&self, record: ViewerTokenRecord) -> AppResult<()> {
        self.records
            .lock()
            .await
            .insert(record.token_hash.clone(), record);
        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<ViewerTokenRecord>> {
        Ok(self.records.lock().await.get(token_hash).cloned())
    }
}

fn issue_input(tenant_id: TenantId) -> IssueViewerTokenInput {
    IssueViewerTokenInput {
        tenant_id,
        subject: "alice".to_owned(),
        display_name: String::new(),
        acting_tenant_id: None,
        expires_at: None,
    }
}

#[tokio::test]
async fn issued_token_authenticates_and_only_hash_is_stored() {
    let tenant_id = TenantId::new();
    let repository = Arc::new(FakeViewerTokenRepository::default());
    let service = ViewerAuthService::new(repository.clone());

    let Ok(raw_token) = service.issue_token(issue_input(tenant_id)).await else {
        panic!("token should be issued");
    };

    let records = repository.records.lock().await;
    assert!(!records.contains_key(&raw_token));
    assert!(records.contains_key(&hash_token(&raw_token)));
    drop(records);

    let identity = service.authenticate(&raw_token).await;
    assert!(identity.is_ok_and(|identity| {
        identity.subject() == "alice"
            && identity.display_name() == "alice"
            && identity.effective_tenant_id() == tenant_id
    }));
}

#[tokio::test]
async fn acting_tenant_overrides_home_tenant() {
    let home = TenantId::new();
    let acting = TenantId::new();
    let service = ViewerAuthService::new(Arc::new(FakeViewerTokenRepository::default()));
    let mut input = issue_input(home);
    input.acting_tenant_id = Some(acting);

    let Ok(raw_token) = service.issue_token(input).await else {
        panic!("token should be issued");
    };

    let identity = service.authenticate(&raw_token).await;
    assert!(identity.is_ok_and(|identity| {
        identity.tenant_id() == home && identity.effective_tenant_id() == acting
    }));
}

#[tokio::test]
async fn unknown_blank_and_expired_tokens_are_unauthorized() {
    let now = Utc::now();
    let service = ViewerAuthService::new(Arc::new(FakeViewerTokenRepository::default()));
    let mut input = issue_input(TenantId::new());
    input.expires_at = Some(now + TimeDelta::minutes(5));

    let Ok(raw_token) = service.issue_token(input).await else {
        panic!("token should be issued");
    };

    assert!(service.authenticate_at(&raw_token, now).await.is_ok());

    let expired = service
        .authenticate_at(&raw_token, now + TimeDelta::minutes(5))
        .await;
    assert!(matches!(expired, Err(AppError::Unauthorized(_))));

    let unknown = service.authenticate("not-a-token").await;
    assert!(matches!(unknown, Err(AppError::Unauthorized(_))));

    let blank = service.authenticate("   ").await;
    assert!(matches!(blank, Err(AppError::Unauthorized(_))));
}
