//! Tenant context for multi-tenant database operations
//!
//! All database operations are scoped by tenant_id so several organisations
//! can keep their shops, catalogs and counting sessions in the same database
//! without seeing each other's rows.

/// Tenant context passed to all database operations for isolation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantContext {
    /// Tenant identifier for scoping database operations
    pub tenant_id: String,
}

impl TenantContext {
    /// Create a new tenant context with the specified tenant ID
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
        }
    }

    /// Tenant used when a token carries no explicit tenant claim
    pub fn default_tenant() -> Self {
        Self::new("default")
    }

    /// Get the tenant_id as a string reference
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }
}

impl Default for TenantContext {
    fn default() -> Self {
        Self::default_tenant()
    }
}

impl std::fmt::Display for TenantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TenantContext({})", self.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_context() {
        assert_eq!(TenantContext::default().tenant_id, "default");
        assert_eq!(TenantContext::default_tenant().tenant_id(), "default");
    }

    #[test]
    fn test_custom_context() {
        let ctx = TenantContext::new("north-region");
        assert_eq!(ctx.tenant_id, "north-region");
        assert_eq!(ctx.to_string(), "TenantContext(north-region)");
    }
}
