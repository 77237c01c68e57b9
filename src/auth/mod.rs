//! Identity and authorization for stockroom
//!
//! Provides:
//! - The acting user (`Actor`) passed explicitly into every service call
//! - Per-operation capability requirements
//! - JWT token generation and validation

pub mod jwt;
pub mod permissions;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::db::TenantContext;
use crate::error::LedgerError;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenValidationResult};
pub use permissions::{authorize, get_required_permission, is_operation_allowed, PermissionLevel};

/// Role classification supplied by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Manager,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Manager => "manager",
            Role::Employee => "employee",
        }
    }

    /// Highest permission level this role holds
    pub fn permission_level(&self) -> PermissionLevel {
        match self {
            Role::Manager => PermissionLevel::Manager,
            Role::Employee => PermissionLevel::Any,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manager" => Ok(Role::Manager),
            "employee" => Ok(Role::Employee),
            other => Err(LedgerError::Unauthenticated(format!("Unknown role: {}", other))),
        }
    }
}

/// The user performing a request, with the tenant they act within
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
    pub tenant: TenantContext,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role, tenant: TenantContext) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            tenant,
        }
    }

    pub fn manager(user_id: impl Into<String>, tenant: TenantContext) -> Self {
        Self::new(user_id, Role::Manager, tenant)
    }

    pub fn employee(user_id: impl Into<String>, tenant: TenantContext) -> Self {
        Self::new(user_id, Role::Employee, tenant)
    }

    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }

    pub fn ctx(&self) -> &TenantContext {
        &self.tenant
    }
}
