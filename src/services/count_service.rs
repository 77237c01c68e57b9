//! Count service - recording stock counts against an active session
//!
//! Saving is one immediate transaction: the session status is re-read under
//! the write lock, so a session completed between page load and save is
//! rejected and no row is written. Rows are upserted per
//! (session, shop, item); a later save fully replaces an earlier one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use diesel::SqliteConnection;
use tracing::info;

use crate::auth::{authorize, Actor};
use crate::config::{AccessConfig, UnassignedPolicy};
use crate::db::stock_counts::{self, CountValue};
use crate::db::{catalog, sessions, Item, LedgerDb, Shop, StockCount, TenantContext};
use crate::error::LedgerError;

use super::events::{EventBus, LedgerEvent};
use super::session_service::employee_has_session_access;

/// One quantity line as submitted by a client, before clamping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountEntry {
    pub item_id: String,
    pub boxes: i64,
    pub singles: i64,
}

impl CountEntry {
    pub fn new(item_id: impl Into<String>, boxes: i64, singles: i64) -> Self {
        Self {
            item_id: item_id.into(),
            boxes,
            singles,
        }
    }
}

/// Clamp a submitted quantity into `[0, max]`
pub fn clamp_quantity(value: i64, max: i32) -> i32 {
    value.clamp(0, i64::from(max.max(0))) as i32
}

/// Clamp every entry and drop the ones that end up (0, 0)
///
/// A repeated item id keeps its last occurrence. The result is ordered by
/// item id.
pub fn prepare_write_set(entries: &[CountEntry], max: i32) -> Vec<(String, i32, i32)> {
    let mut by_item: HashMap<&str, (i32, i32)> = HashMap::new();
    for entry in entries {
        let item_id = entry.item_id.trim();
        if item_id.is_empty() {
            continue;
        }
        by_item.insert(
            item_id,
            (clamp_quantity(entry.boxes, max), clamp_quantity(entry.singles, max)),
        );
    }

    let mut rows: Vec<(String, i32, i32)> = by_item
        .into_iter()
        .filter(|(_, (boxes, singles))| *boxes != 0 || *singles != 0)
        .map(|(item_id, (boxes, singles))| (item_id.to_string(), boxes, singles))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
}

/// Count service for business logic
pub struct CountService {
    db: Arc<LedgerDb>,
    events: Arc<EventBus>,
    access: AccessConfig,
    max_quantity: i32,
}

impl CountService {
    pub fn new(
        db: Arc<LedgerDb>,
        events: Arc<EventBus>,
        access: AccessConfig,
        max_quantity: i32,
    ) -> Self {
        Self {
            db,
            events,
            access,
            max_quantity,
        }
    }

    // =========================================================================
    // Visibility
    // =========================================================================

    /// Shops the actor may count at: all shops for managers, the employee's
    /// own shop assignments otherwise
    pub fn visible_shops(&self, actor: &Actor) -> Result<Vec<Shop>, LedgerError> {
        authorize(actor, "list_shops")?;
        let ctx = actor.ctx();

        self.db.with_conn(|conn| {
            if actor.is_manager() {
                return catalog::list_shops(conn, ctx, None);
            }
            let shop_ids = catalog::employee_shop_ids(conn, ctx, &actor.user_id)?;
            if shop_ids.is_empty() {
                return Ok(Vec::new());
            }
            catalog::list_shops(conn, ctx, Some(shop_ids.as_slice()))
        })
    }

    /// Items eligible for counting at a shop
    ///
    /// A shop without shop-item rows offers every item under the open policy
    /// and nothing under the closed one.
    pub fn items_for_shop(&self, actor: &Actor, shop_id: &str) -> Result<Vec<Item>, LedgerError> {
        authorize(actor, "list_shop_items")?;
        let ctx = actor.ctx();

        self.db.with_conn(|conn| {
            if catalog::get_shop(conn, ctx, shop_id)?.is_none() {
                return Err(LedgerError::NotFound(format!("Shop {} not found", shop_id)));
            }

            if !actor.is_manager()
                && !catalog::employee_has_shop(conn, ctx, &actor.user_id, shop_id)?
            {
                return Err(LedgerError::Forbidden(format!(
                    "{} is not assigned to shop {}",
                    actor.user_id, shop_id
                )));
            }

            self.eligible_items(conn, ctx, shop_id)
        })
    }

    fn eligible_items(
        &self,
        conn: &mut SqliteConnection,
        ctx: &TenantContext,
        shop_id: &str,
    ) -> Result<Vec<Item>, LedgerError> {
        let item_ids = catalog::shop_item_ids(conn, ctx, shop_id)?;
        if item_ids.is_empty() {
            return match self.access.unassigned_shop_items {
                UnassignedPolicy::Open => catalog::list_items(conn, ctx, None),
                UnassignedPolicy::Closed => Ok(Vec::new()),
            };
        }

        catalog::list_items(conn, ctx, Some(item_ids.as_slice()))
    }

    // =========================================================================
    // Counts
    // =========================================================================

    /// Persisted counts for one shop in a session
    pub fn counts_for_shop(
        &self,
        actor: &Actor,
        session_id: &str,
        shop_id: &str,
    ) -> Result<Vec<StockCount>, LedgerError> {
        authorize(actor, "read_counts")?;
        let ctx = actor.ctx();

        self.db.with_conn(|conn| {
            if sessions::get_session(conn, ctx, session_id)?.is_none() {
                return Err(LedgerError::NotFound(format!("Session {} not found", session_id)));
            }

            if !actor.is_manager() {
                if !catalog::employee_has_shop(conn, ctx, &actor.user_id, shop_id)? {
                    return Err(LedgerError::Forbidden(format!(
                        "{} is not assigned to shop {}",
                        actor.user_id, shop_id
                    )));
                }
                let policy = self.access.unassigned_sessions;
                if !employee_has_session_access(conn, actor, session_id, policy)? {
                    return Err(LedgerError::Forbidden(format!(
                        "Session {} is not assigned to {}",
                        session_id, actor.user_id
                    )));
                }
            }

            stock_counts::counts_for_shop(conn, ctx, session_id, shop_id)
        })
    }

    /// Save counts for one shop and return the reloaded counts for that shop
    pub fn save_counts(
        &self,
        actor: &Actor,
        session_id: &str,
        shop_id: &str,
        entries: &[CountEntry],
    ) -> Result<Vec<StockCount>, LedgerError> {
        authorize(actor, "save_counts")?;
        let ctx = actor.ctx();

        let (saved, rows) = self.db.with_transaction(|conn| {
            let session = sessions::get_session(conn, ctx, session_id)?
                .ok_or_else(|| {
                    LedgerError::NotFound(format!("Session {} not found", session_id))
                })?;
            if !session.is_active() {
                return Err(LedgerError::SessionNotActive(session_id.to_string()));
            }

            if catalog::get_shop(conn, ctx, shop_id)?.is_none() {
                return Err(LedgerError::NotFound(format!("Shop {} not found", shop_id)));
            }

            if !actor.is_manager() {
                if !catalog::employee_has_shop(conn, ctx, &actor.user_id, shop_id)? {
                    return Err(LedgerError::Forbidden(format!(
                        "{} is not assigned to shop {}",
                        actor.user_id, shop_id
                    )));
                }
                let policy = self.access.unassigned_sessions;
                if !employee_has_session_access(conn, actor, session_id, policy)? {
                    return Err(LedgerError::Forbidden(format!(
                        "Session {} is not assigned to {}",
                        session_id, actor.user_id
                    )));
                }
            }

            let write_set = prepare_write_set(entries, self.max_quantity);
            if write_set.is_empty() {
                return Err(LedgerError::InvalidInput("Nothing to save".into()));
            }

            let eligible: HashSet<String> = self
                .eligible_items(conn, ctx, shop_id)?
                .into_iter()
                .map(|item| item.id)
                .collect();
            let unknown: Vec<&str> = write_set
                .iter()
                .map(|(item_id, _, _)| item_id.as_str())
                .filter(|item_id| !eligible.contains(*item_id))
                .collect();
            if !unknown.is_empty() {
                return Err(LedgerError::InvalidInput(format!(
                    "Items not countable at shop {}: {}",
                    shop_id,
                    unknown.join(", ")
                )));
            }

            let values: Vec<CountValue<'_>> = write_set
                .iter()
                .map(|(item_id, boxes, singles)| CountValue {
                    item_id,
                    boxes: *boxes,
                    singles: *singles,
                })
                .collect();

            stock_counts::upsert_counts(conn, ctx, session_id, shop_id, &actor.user_id, &values)?;

            let saved = stock_counts::counts_for_shop(conn, ctx, session_id, shop_id)?;
            Ok((saved, values.len()))
        })?;

        info!(
            tenant = %ctx.tenant_id(),
            session_id = %session_id,
            shop_id = %shop_id,
            actor = %actor.user_id,
            rows,
            "Counts saved"
        );

        self.events.emit(LedgerEvent::CountsSaved {
            tenant: ctx.tenant_id().to_string(),
            session_id: session_id.to_string(),
            shop_id: shop_id.to_string(),
            counted_by: actor.user_id.clone(),
            rows,
        });

        Ok(saved)
    }
}
