//! Service layer for stockroom
//!
//! Services sit between HTTP handlers and repositories. Each one takes the
//! acting [`Actor`](crate::auth::Actor) explicitly and adds:
//! - Authorization against the per-operation permission table
//! - Input validation
//! - Transaction boundaries
//! - Event emission for audit logging
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (business logic)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod response;
pub mod events;
pub mod session_service;
pub mod count_service;
pub mod catalog_service;
pub mod export_service;
pub mod import_service;

// Re-exports
pub use response::*;
pub use events::{spawn_logging_listener, EventBus, EventListener, LedgerEvent};
pub use session_service::SessionService;
pub use count_service::CountService;
pub use catalog_service::CatalogService;
pub use export_service::ExportService;
pub use import_service::ImportService;

use crate::config::{AccessConfig, LimitsConfig};
use crate::db::LedgerDb;
use std::sync::Arc;

/// Service container for dependency injection
///
/// Holds all services with a shared database pool and event bus.
pub struct Services {
    pub sessions: Arc<SessionService>,
    pub counts: Arc<CountService>,
    pub catalog: Arc<CatalogService>,
    pub export: Arc<ExportService>,
    pub import: Arc<ImportService>,
    pub events: Arc<EventBus>,
    pub db: Arc<LedgerDb>,
}

impl Services {
    /// Create all services with shared database
    pub fn new(db: Arc<LedgerDb>, access: AccessConfig, limits: LimitsConfig) -> Self {
        let events = Arc::new(EventBus::new());

        Self {
            sessions: Arc::new(SessionService::new(
                db.clone(),
                events.clone(),
                access.unassigned_sessions,
            )),
            counts: Arc::new(CountService::new(
                db.clone(),
                events.clone(),
                access,
                limits.max_quantity,
            )),
            catalog: Arc::new(CatalogService::new(db.clone(), events.clone())),
            export: Arc::new(ExportService::new(db.clone())),
            import: Arc::new(ImportService::new(db.clone(), events.clone())),
            events,
            db,
        }
    }

    /// Services over a fresh in-memory database with default access rules
    pub fn in_memory() -> Result<Self, crate::error::LedgerError> {
        let db = Arc::new(LedgerDb::open_in_memory()?);
        Ok(Self::new(db, AccessConfig::default(), LimitsConfig::default()))
    }
}
