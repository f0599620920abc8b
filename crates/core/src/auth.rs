use serde::{Deserialize, Serialize};

use crate::TenantId;

/// Authenticated viewer resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    subject: String,
    display_name: String,
    tenant_id: TenantId,
    acting_tenant_id: Option<TenantId>,
}

impl UserIdentity {
    /// Creates an identity scoped to its home tenant.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        display_name: impl Into<String>,
        tenant_id: TenantId,
    ) -> Self {
        Self {
            subject: subject.into(),
            display_name: display_name.into(),
            tenant_id,
            acting_tenant_id: None,
        }
    }

    /// Returns a copy acting in another tenant's context.
    #[must_use]
    pub fn acting_as(mut self, tenant_id: TenantId) -> Self {
        self.acting_tenant_id = Some(tenant_id);
        self
    }

    /// Returns the stable subject claim.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the display name for the current viewer.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the home tenant linked to the identity.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the tenant whose data the viewer currently sees.
    ///
    /// Privileged viewers may act in another tenant's context; everyone else
    /// sees their home tenant.
    #[must_use]
    pub fn effective_tenant_id(&self) -> TenantId {
        self.acting_tenant_id.unwrap_or(self.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::UserIdentity;
    use crate::TenantId;

    #[test]
    fn effective_tenant_defaults_to_home_tenant() {
        let tenant_id = TenantId::new();
        let identity = UserIdentity::new("alice", "Alice", tenant_id);
        assert_eq!(identity.effective_tenant_id(), tenant_id);
    }

    #[test]
    fn acting_tenant_overrides_effective_tenant() {
        let home = TenantId::new();
        let other = TenantId::new();
        let identity = UserIdentity::new("support", "Support", home).acting_as(other);

        assert_eq!(identity.tenant_id(), home);
        assert_eq!(identity.effective_tenant_id(), other);
    }
}
