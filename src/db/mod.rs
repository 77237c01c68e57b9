//! SQLite database module for the stock-count ledger
//!
//! ## Tables
//!
//! Catalog (reference data, plain CRUD):
//! - `shops`, `categories`, `items`
//! - `shop_items` - which items are counted at which shop
//! - `employee_shops` - which shops an employee counts at
//!
//! Ledger (owned by the session and count services):
//! - `count_sessions` - counting sessions, `active` or `completed`
//! - `session_assignments` - employees allowed to count in a session
//! - `stock_counts` - one row per (session, shop, item)
//!
//! Every table carries `tenant_id`; repository functions take a
//! [`TenantContext`] and never read or write outside it.

pub mod context;
pub mod schema;
pub mod diesel_schema;
pub mod models;
pub mod catalog;
pub mod sessions;
pub mod stock_counts;

use std::path::Path;
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use tracing::{debug, info};

use crate::error::LedgerError;

pub use context::TenantContext;

pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;
pub type PooledSqlite = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Per-connection pragmas applied whenever the pool hands out a connection
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout_ms: u64,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON;",
            self.busy_timeout_ms
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// SQLite database for catalog and ledger rows
pub struct LedgerDb {
    pool: SqlitePool,
}

impl LedgerDb {
    /// Open or create the ledger database file
    pub fn open(db_path: &Path, pool_size: u32, busy_timeout_ms: u64) -> Result<Self, LedgerError> {
        info!("Opening SQLite database at {:?}", db_path);

        let manager = ConnectionManager::<SqliteConnection>::new(db_path.to_string_lossy());
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_customizer(Box::new(ConnectionOptions { busy_timeout_ms }))
            .build(manager)?;

        let db = Self { pool };

        // WAL lets readers proceed while a count upsert is being written
        db.with_conn(|conn| {
            conn.batch_execute("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
                .map_err(|e| LedgerError::Internal(format!("Failed to set PRAGMA: {}", e)))
        })?;

        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        debug!("Opening in-memory SQLite database");

        let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(Duration::from_secs(30))
            .connection_customizer(Box::new(ConnectionOptions { busy_timeout_ms: 5000 }))
            .build(manager)?;

        let db = Self { pool };
        db.init_schema()?;

        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), LedgerError> {
        self.with_conn(schema::init_schema)
    }

    /// Check out a pooled connection
    pub fn conn(&self) -> Result<PooledSqlite, LedgerError> {
        Ok(self.pool.get()?)
    }

    /// Run a closure against a pooled connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, LedgerError>,
    {
        let mut conn = self.conn()?;
        f(&mut conn)
    }

    /// Run a closure inside a transaction; any error rolls everything back
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, LedgerError>,
    {
        let mut conn = self.conn()?;
        conn.immediate_transaction(f)
    }

    /// Get database statistics for a tenant
    pub fn stats(&self, ctx: &TenantContext) -> Result<DbStats, LedgerError> {
        use diesel_schema::{count_sessions, items, shops, stock_counts};

        self.with_conn(|conn| {
            let shop_count: i64 = shops::table
                .filter(shops::tenant_id.eq(ctx.tenant_id()))
                .count()
                .get_result(conn)?;

            let item_count: i64 = items::table
                .filter(items::tenant_id.eq(ctx.tenant_id()))
                .count()
                .get_result(conn)?;

            let active_sessions: i64 = count_sessions::table
                .filter(count_sessions::tenant_id.eq(ctx.tenant_id()))
                .filter(count_sessions::status.eq(models::session_statuses::ACTIVE))
                .count()
                .get_result(conn)?;

            let count_rows: i64 = stock_counts::table
                .filter(stock_counts::tenant_id.eq(ctx.tenant_id()))
                .count()
                .get_result(conn)?;

            Ok(DbStats {
                shop_count: shop_count as u64,
                item_count: item_count as u64,
                active_sessions: active_sessions as u64,
                count_rows: count_rows as u64,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub shop_count: u64,
    pub item_count: u64,
    pub active_sessions: u64,
    pub count_rows: u64,
}

// Re-exports
pub use models::{
    Category, CountSession, EmployeeShop, Item, SessionAssignment, Shop, ShopItem, StockCount,
};
