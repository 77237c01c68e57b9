//! Catalog service - shops, categories, items and their assignments
//!
//! Managers write, everyone reads. Validation trims names and checks that
//! referenced rows exist within the actor's tenant.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use crate::auth::{authorize, Actor};
use crate::db::catalog::{self, CreateCategoryInput, CreateItemInput, CreateShopInput};
use crate::db::{Category, Item, LedgerDb, Shop};
use crate::error::LedgerError;

use super::events::{EventBus, LedgerEvent};

fn required_name(name: &str, what: &str) -> Result<String, LedgerError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::InvalidInput(format!("{} name is required", what)));
    }
    Ok(name.to_string())
}

/// Catalog service for business logic
pub struct CatalogService {
    db: Arc<LedgerDb>,
    events: Arc<EventBus>,
}

impl CatalogService {
    pub fn new(db: Arc<LedgerDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Shops
    // =========================================================================

    pub fn create_shop(&self, actor: &Actor, input: CreateShopInput) -> Result<Shop, LedgerError> {
        authorize(actor, "create_shop")?;
        let input = CreateShopInput {
            name: required_name(&input.name, "Shop")?,
        };

        let shop = self.db.with_conn(|conn| catalog::create_shop(conn, actor.ctx(), &input))?;

        info!(tenant = %actor.ctx().tenant_id(), shop_id = %shop.id, "Shop created");
        self.events.emit(LedgerEvent::ShopCreated {
            tenant: actor.ctx().tenant_id().to_string(),
            id: shop.id.clone(),
        });

        Ok(shop)
    }

    pub fn delete_shop(&self, actor: &Actor, id: &str) -> Result<bool, LedgerError> {
        authorize(actor, "delete_shop")?;

        let deleted = self.db.with_conn(|conn| catalog::delete_shop(conn, actor.ctx(), id))?;
        if deleted {
            self.events.emit(LedgerEvent::ShopDeleted {
                tenant: actor.ctx().tenant_id().to_string(),
                id: id.to_string(),
            });
        }

        Ok(deleted)
    }

    /// Replace the full item set of a shop; unknown item ids are rejected
    pub fn set_shop_items(
        &self,
        actor: &Actor,
        shop_id: &str,
        item_ids: &[String],
    ) -> Result<Vec<String>, LedgerError> {
        authorize(actor, "set_shop_items")?;
        let ctx = actor.ctx();

        let wanted: Vec<String> = item_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let stored = self.db.with_conn(|conn| {
            if catalog::get_shop(conn, ctx, shop_id)?.is_none() {
                return Err(LedgerError::NotFound(format!("Shop {} not found", shop_id)));
            }

            let known = catalog::list_items(conn, ctx, Some(wanted.as_slice()))?;
            if known.len() != wanted.len() {
                let missing: Vec<&str> = wanted
                    .iter()
                    .filter(|id| !known.iter().any(|item| &item.id == *id))
                    .map(String::as_str)
                    .collect();
                return Err(LedgerError::InvalidInput(format!(
                    "Unknown item ids: {}",
                    missing.join(", ")
                )));
            }

            catalog::set_shop_items(conn, ctx, shop_id, &wanted)?;
            catalog::shop_item_ids(conn, ctx, shop_id)
        })?;

        self.events.emit(LedgerEvent::ShopItemsReplaced {
            tenant: ctx.tenant_id().to_string(),
            shop_id: shop_id.to_string(),
            count: stored.len(),
        });

        Ok(stored)
    }

    pub fn assign_employee_shop(
        &self,
        actor: &Actor,
        user_id: &str,
        shop_id: &str,
    ) -> Result<bool, LedgerError> {
        authorize(actor, "assign_employee_shop")?;
        let ctx = actor.ctx();
        let user_id = required_name(user_id, "User")?;

        self.db.with_conn(|conn| {
            if catalog::get_shop(conn, ctx, shop_id)?.is_none() {
                return Err(LedgerError::NotFound(format!("Shop {} not found", shop_id)));
            }
            catalog::assign_employee_shop(conn, ctx, &user_id, shop_id)
        })
    }

    pub fn unassign_employee_shop(
        &self,
        actor: &Actor,
        user_id: &str,
        shop_id: &str,
    ) -> Result<bool, LedgerError> {
        authorize(actor, "unassign_employee_shop")?;
        self.db
            .with_conn(|conn| catalog::unassign_employee_shop(conn, actor.ctx(), user_id, shop_id))
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub fn list_categories(&self, actor: &Actor) -> Result<Vec<Category>, LedgerError> {
        authorize(actor, "list_categories")?;
        self.db.with_conn(|conn| catalog::list_categories(conn, actor.ctx()))
    }

    /// Create a category; names are unique per tenant ignoring case
    pub fn create_category(
        &self,
        actor: &Actor,
        input: CreateCategoryInput,
    ) -> Result<Category, LedgerError> {
        authorize(actor, "create_category")?;
        let input = CreateCategoryInput {
            name: required_name(&input.name, "Category")?,
            sort_order: input.sort_order,
        };

        self.db.with_conn(|conn| {
            if catalog::find_category_by_name(conn, actor.ctx(), &input.name)?.is_some() {
                return Err(LedgerError::InvalidInput(format!(
                    "Category {} already exists",
                    input.name
                )));
            }
            catalog::create_category(conn, actor.ctx(), &input)
        })
    }

    // =========================================================================
    // Items
    // =========================================================================

    pub fn list_items(&self, actor: &Actor) -> Result<Vec<Item>, LedgerError> {
        authorize(actor, "list_items")?;
        self.db.with_conn(|conn| catalog::list_items(conn, actor.ctx(), None))
    }

    pub fn create_item(&self, actor: &Actor, input: CreateItemInput) -> Result<Item, LedgerError> {
        authorize(actor, "create_item")?;
        let ctx = actor.ctx();

        let input = CreateItemInput {
            name: required_name(&input.name, "Item")?,
            pack_size: input
                .pack_size
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            category_id: input
                .category_id
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        };

        let item = self.db.with_conn(|conn| {
            if let Some(category_id) = &input.category_id {
                let exists = catalog::list_categories(conn, ctx)?
                    .iter()
                    .any(|c| &c.id == category_id);
                if !exists {
                    return Err(LedgerError::InvalidInput(format!(
                        "Unknown category {}",
                        category_id
                    )));
                }
            }
            catalog::create_item(conn, ctx, &input)
        })?;

        self.events.emit(LedgerEvent::ItemCreated {
            tenant: ctx.tenant_id().to_string(),
            id: item.id.clone(),
        });

        Ok(item)
    }

    pub fn delete_item(&self, actor: &Actor, id: &str) -> Result<bool, LedgerError> {
        authorize(actor, "delete_item")?;

        let deleted = self.db.with_conn(|conn| catalog::delete_item(conn, actor.ctx(), id))?;
        if deleted {
            self.events.emit(LedgerEvent::ItemDeleted {
                tenant: actor.ctx().tenant_id().to_string(),
                id: id.to_string(),
            });
        }

        Ok(deleted)
    }
}
