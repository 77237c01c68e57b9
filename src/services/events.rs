//! Event system for ledger operations
//!
//! Provides an event bus for notifying listeners about ledger and catalog
//! changes. The logging listener turns events into audit lines.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Ledger events emitted by services
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    // Session events
    SessionCreated {
        tenant: String,
        id: String,
        name: String,
        created_by: String,
        assignees: usize,
    },
    SessionCompleted {
        tenant: String,
        id: String,
        completed_by: String,
    },
    SessionDeleted {
        tenant: String,
        id: String,
        counts_deleted: usize,
    },

    // Count events
    CountsSaved {
        tenant: String,
        session_id: String,
        shop_id: String,
        counted_by: String,
        rows: usize,
    },

    // Catalog events
    ShopCreated {
        tenant: String,
        id: String,
    },
    ShopDeleted {
        tenant: String,
        id: String,
    },
    ItemCreated {
        tenant: String,
        id: String,
    },
    ItemDeleted {
        tenant: String,
        id: String,
    },
    ShopItemsReplaced {
        tenant: String,
        shop_id: String,
        count: usize,
    },
    ItemsImported {
        tenant: String,
        imported: usize,
        failed: usize,
        categories_created: usize,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: &LedgerEvent);
}

/// Event bus for broadcasting ledger events
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: LedgerEvent) {
        trace!(event = ?event, "Emitting ledger event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::SessionCreated { tenant, id, created_by, .. } => {
                debug!(
                    tenant = %tenant,
                    session_id = %id,
                    actor = %created_by,
                    "audit: session created"
                );
            }
            LedgerEvent::SessionCompleted { tenant, id, completed_by } => {
                debug!(
                    tenant = %tenant,
                    session_id = %id,
                    actor = %completed_by,
                    "audit: session completed"
                );
            }
            LedgerEvent::SessionDeleted { tenant, id, counts_deleted } => {
                debug!(
                    tenant = %tenant,
                    session_id = %id,
                    counts_deleted,
                    "audit: session deleted"
                );
            }
            LedgerEvent::CountsSaved {
                tenant,
                session_id,
                shop_id,
                counted_by,
                rows,
            } => {
                debug!(
                    tenant = %tenant,
                    session_id = %session_id,
                    shop_id = %shop_id,
                    actor = %counted_by,
                    rows,
                    "audit: counts saved"
                );
            }
            _ => {
                trace!(event = ?event, "Ledger event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}
