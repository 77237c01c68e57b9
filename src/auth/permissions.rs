//! Permission levels and operation whitelist for ledger and catalog operations

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Actor;
use crate::error::LedgerError;

/// Capability required to run an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum PermissionLevel {
    /// Any authenticated role - reads and count recording
    #[default]
    Any = 0,
    /// Manager - session lifecycle, catalog writes, export and import
    Manager = 1,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionLevel::Any => write!(f, "ANY"),
            PermissionLevel::Manager => write!(f, "MANAGER"),
        }
    }
}

/// Get the required permission level for a named operation.
/// Returns None for unknown operations (which should be blocked).
pub fn get_required_permission(operation: &str) -> Option<PermissionLevel> {
    match operation {
        "list_sessions"
        | "get_session"
        | "read_counts"
        | "save_counts"
        | "list_shops"
        | "list_shop_items"
        | "list_categories"
        | "list_items" => Some(PermissionLevel::Any),

        "create_session"
        | "complete_session"
        | "delete_session"
        | "list_assignments"
        | "export_session"
        | "create_shop"
        | "delete_shop"
        | "set_shop_items"
        | "create_category"
        | "create_item"
        | "delete_item"
        | "assign_employee_shop"
        | "unassign_employee_shop"
        | "import_items"
        | "read_stats" => Some(PermissionLevel::Manager),

        _ => None,
    }
}

/// Check if an operation is allowed for the given permission level
pub fn is_operation_allowed(operation: &str, level: PermissionLevel) -> bool {
    match get_required_permission(operation) {
        Some(required) => level >= required,
        None => false,
    }
}

/// Reject the actor unless their role covers the operation
pub fn authorize(actor: &Actor, operation: &str) -> Result<(), LedgerError> {
    if is_operation_allowed(operation, actor.role.permission_level()) {
        return Ok(());
    }

    Err(LedgerError::Forbidden(format!(
        "{} may not perform {}",
        actor.role, operation
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TenantContext;

    #[test]
    fn test_any_operations() {
        assert!(is_operation_allowed("save_counts", PermissionLevel::Any));
        assert!(is_operation_allowed("save_counts", PermissionLevel::Manager));
        assert!(is_operation_allowed("list_items", PermissionLevel::Any));
    }

    #[test]
    fn test_manager_operations() {
        assert!(!is_operation_allowed("complete_session", PermissionLevel::Any));
        assert!(is_operation_allowed("complete_session", PermissionLevel::Manager));
        assert!(!is_operation_allowed("import_items", PermissionLevel::Any));
    }

    #[test]
    fn test_unknown_operations_blocked() {
        assert!(!is_operation_allowed("reopen_session", PermissionLevel::Manager));
        assert!(get_required_permission("drop_tables").is_none());
    }

    #[test]
    fn test_authorize_employee() {
        let employee = Actor::employee("emp-1", TenantContext::default());
        assert!(authorize(&employee, "read_counts").is_ok());
        assert!(matches!(
            authorize(&employee, "delete_session"),
            Err(LedgerError::Forbidden(_))
        ));
    }
}
