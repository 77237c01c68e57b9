//! Database schema definitions

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use tracing::info;

use crate::error::LedgerError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

#[derive(QueryableByName)]
struct VersionRow {
    #[diesel(sql_type = Integer)]
    version: i32,
}

/// Initialize the database schema
pub fn init_schema(conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &mut SqliteConnection) -> Result<i32, LedgerError> {
    conn.batch_execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .map_err(|e| {
            LedgerError::Internal(format!("Failed to create schema_version table: {}", e))
        })?;

    let version = diesel::sql_query("SELECT version FROM schema_version LIMIT 1")
        .get_result::<VersionRow>(conn)
        .optional()
        .map_err(|e| LedgerError::Internal(format!("Failed to read schema_version: {}", e)))?
        .map(|row| row.version)
        .unwrap_or(0);

    Ok(version)
}

/// Set schema version
fn set_schema_version(conn: &mut SqliteConnection, version: i32) -> Result<(), LedgerError> {
    conn.batch_execute(&format!(
        "DELETE FROM schema_version; INSERT INTO schema_version (version) VALUES ({});",
        version
    ))
    .map_err(|e| LedgerError::Internal(format!("Failed to set schema_version: {}", e)))
}

/// Create all tables
fn create_tables(conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    conn.batch_execute(CATALOG_SCHEMA)
        .map_err(|e| LedgerError::Internal(format!("Failed to create catalog tables: {}", e)))?;

    conn.batch_execute(LEDGER_SCHEMA)
        .map_err(|e| LedgerError::Internal(format!("Failed to create ledger tables: {}", e)))?;

    conn.batch_execute(INDEXES_SCHEMA)
        .map_err(|e| LedgerError::Internal(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Migrate schema from older version
fn migrate_schema(conn: &mut SqliteConnection, from_version: i32) -> Result<(), LedgerError> {
    // v1 is the first released layout; later steps are matched on from_version
    info!(from_version, "No migration steps registered");
    set_schema_version(conn, SCHEMA_VERSION)
}

/// Catalog reference data: shops, categories, items and their assignments
const CATALOG_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS shops (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    name TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    name TEXT NOT NULL,
    -- Free text as it appears on the supplier sheet ("12", "6x330ml")
    pack_size TEXT,
    category_id TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),

    FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL
);

-- Which items are presented for counting at which shop
CREATE TABLE IF NOT EXISTS shop_items (
    tenant_id TEXT NOT NULL,
    shop_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    PRIMARY KEY (tenant_id, shop_id, item_id),
    FOREIGN KEY (shop_id) REFERENCES shops(id) ON DELETE CASCADE,
    FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE
);

-- Which shops an employee counts at
CREATE TABLE IF NOT EXISTS employee_shops (
    tenant_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    shop_id TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    PRIMARY KEY (tenant_id, user_id, shop_id),
    FOREIGN KEY (shop_id) REFERENCES shops(id) ON DELETE CASCADE
);
"#;

/// Ledger data: counting sessions, their assignees and the recorded counts
const LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS count_sessions (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'completed')),
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    completed_at TEXT,

    CHECK ((status = 'completed') = (completed_at IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS session_assignments (
    tenant_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    PRIMARY KEY (tenant_id, session_id, user_id),
    FOREIGN KEY (session_id) REFERENCES count_sessions(id)
);

-- Exactly one row per (session, shop, item); writes replace in place
CREATE TABLE IF NOT EXISTS stock_counts (
    tenant_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    shop_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    boxes INTEGER NOT NULL DEFAULT 0 CHECK (boxes >= 0),
    singles INTEGER NOT NULL DEFAULT 0 CHECK (singles >= 0),
    counted_by TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (tenant_id, session_id, shop_id, item_id),
    FOREIGN KEY (session_id) REFERENCES count_sessions(id)
);
"#;

/// Index definitions for fast queries
const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_shops_tenant ON shops(tenant_id, name);
CREATE INDEX IF NOT EXISTS idx_categories_tenant ON categories(tenant_id, sort_order);
CREATE INDEX IF NOT EXISTS idx_items_tenant ON items(tenant_id, name);
CREATE INDEX IF NOT EXISTS idx_items_category ON items(category_id);
CREATE INDEX IF NOT EXISTS idx_employee_shops_shop ON employee_shops(tenant_id, shop_id);

CREATE INDEX IF NOT EXISTS idx_sessions_tenant_status ON count_sessions(tenant_id, status);
CREATE INDEX IF NOT EXISTS idx_session_assignments_user ON session_assignments(tenant_id, user_id);
CREATE INDEX IF NOT EXISTS idx_stock_counts_shop ON stock_counts(tenant_id, session_id, shop_id);
"#;
