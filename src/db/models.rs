//! Diesel model definitions for database tables
//!
//! All models include `tenant_id` for multi-tenant scoping.
//! - Queryable structs: for SELECT queries (reading data)
//! - Insertable structs: for INSERT queries (writing data)
//!
//! Field order of every Queryable struct matches the column order of its
//! `table!` definition in diesel_schema.rs.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::diesel_schema::*;

// ============================================================================
// Timestamp Helpers (SQLite stores timestamps as TEXT)
// ============================================================================

/// Get current UTC timestamp as ISO 8601 string for SQLite TEXT columns
pub fn current_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

// ============================================================================
// Session Status
// ============================================================================

/// Session lifecycle states. `active` -> `completed`, never back.
pub mod session_statuses {
    pub const ACTIVE: &str = "active";
    pub const COMPLETED: &str = "completed";
}

// ============================================================================
// Catalog Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = shops)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Shop {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = shops)]
pub struct NewShop<'a> {
    pub id: &'a str,
    pub tenant_id: &'a str,
    pub name: &'a str,
    pub created_at: &'a str,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = categories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Category {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub sort_order: i32,
    pub created_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = categories)]
pub struct NewCategory<'a> {
    pub id: &'a str,
    pub tenant_id: &'a str,
    pub name: &'a str,
    pub sort_order: i32,
    pub created_at: &'a str,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = items)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Item {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub pack_size: Option<String>,
    pub category_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = items)]
pub struct NewItem<'a> {
    pub id: &'a str,
    pub tenant_id: &'a str,
    pub name: &'a str,
    pub pack_size: Option<&'a str>,
    pub category_id: Option<&'a str>,
    pub created_at: &'a str,
}

/// Shop item assignment row
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = shop_items)]
pub struct ShopItem {
    pub tenant_id: String,
    pub shop_id: String,
    pub item_id: String,
}

/// Employee shop assignment row
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = employee_shops)]
pub struct EmployeeShop {
    pub tenant_id: String,
    pub user_id: String,
    pub shop_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = employee_shops)]
pub struct NewEmployeeShop<'a> {
    pub tenant_id: &'a str,
    pub user_id: &'a str,
    pub shop_id: &'a str,
    pub created_at: &'a str,
}

// ============================================================================
// Ledger Models
// ============================================================================

/// Counting session row
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = count_sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CountSession {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub status: String,
    pub created_by: String,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl CountSession {
    pub fn is_active(&self) -> bool {
        self.status == session_statuses::ACTIVE
    }

    pub fn is_completed(&self) -> bool {
        self.status == session_statuses::COMPLETED
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = count_sessions)]
pub struct NewCountSession<'a> {
    pub id: &'a str,
    pub tenant_id: &'a str,
    pub name: &'a str,
    pub status: &'a str,
    pub created_by: &'a str,
    pub created_at: &'a str,
}

/// Session assignment row - presence restricts which employees may count
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = session_assignments)]
pub struct SessionAssignment {
    pub tenant_id: String,
    pub session_id: String,
    pub user_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = session_assignments)]
pub struct NewSessionAssignment<'a> {
    pub tenant_id: &'a str,
    pub session_id: &'a str,
    pub user_id: &'a str,
    pub created_at: &'a str,
}

/// Recorded quantity for one item at one shop within one session
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = stock_counts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StockCount {
    pub tenant_id: String,
    pub session_id: String,
    pub shop_id: String,
    pub item_id: String,
    pub boxes: i32,
    pub singles: i32,
    pub counted_by: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = stock_counts)]
pub struct NewStockCount<'a> {
    pub tenant_id: &'a str,
    pub session_id: &'a str,
    pub shop_id: &'a str,
    pub item_id: &'a str,
    pub boxes: i32,
    pub singles: i32,
    pub counted_by: &'a str,
    pub updated_at: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format() {
        let ts = current_timestamp();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2026-01-01T00:00:00.000Z".len());
    }
}
