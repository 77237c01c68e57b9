//! Stockroom - stock-count ledger for multi-shop retailers
//!
//! Managers open counting sessions, employees record box and single counts
//! per shop, and a completed session exports as a workbook with one sheet
//! per shop.
//!
//! ## Architecture
//!
//! - **HTTP** (`http`): hyper 1 server, routing and bearer-token auth
//! - **Services** (`services`): authorization, validation, transactions, events
//! - **Repositories** (`db`): tenant-scoped diesel queries over SQLite
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/stockroom/
//! ├── stockroom.db          # SQLite ledger (WAL mode)
//! └── config.toml           # Configuration
//! ```
//!
//! ## Session Lifecycle
//!
//! ```text
//! create ──► active ──complete──► completed ──delete──► (gone)
//!              │
//!              └── save_counts (replace per item)
//! ```

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod services;
pub mod views;

// Re-exports
pub use auth::{Actor, JwtValidator, Role};
pub use config::Config;
pub use db::{LedgerDb, TenantContext};
pub use error::LedgerError;
pub use http::HttpServer;
pub use services::{EventBus, LedgerEvent, Services};
