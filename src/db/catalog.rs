//! Catalog CRUD operations using Diesel with tenant scoping
//!
//! Shops, categories, items and the two reference mappings the ledger reads:
//! shop -> items (what gets counted where) and employee -> shops (who counts
//! where). None of this data is owned by the ledger; it is plain CRUD.

use diesel::prelude::*;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use super::context::TenantContext;
use super::diesel_schema::{categories, employee_shops, items, shop_items, shops};
use super::models::{
    current_timestamp, Category, EmployeeShop, Item, NewCategory, NewEmployeeShop, NewItem,
    NewShop, Shop, ShopItem,
};
use crate::error::LedgerError;

// ============================================================================
// Input Types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateShopInput {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateItemInput {
    pub name: String,
    #[serde(default)]
    pub pack_size: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
}

// ============================================================================
// Shops
// ============================================================================

pub fn create_shop(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    input: &CreateShopInput,
) -> Result<Shop, LedgerError> {
    let id = Uuid::new_v4().to_string();
    let now = current_timestamp();

    diesel::insert_into(shops::table)
        .values(&NewShop {
            id: &id,
            tenant_id: ctx.tenant_id(),
            name: &input.name,
            created_at: &now,
        })
        .execute(conn)?;

    debug!(shop_id = %id, name = %input.name, "Created shop");

    get_shop(conn, ctx, &id)?
        .ok_or_else(|| LedgerError::Internal("Failed to retrieve created shop".into()))
}

pub fn get_shop(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    id: &str,
) -> Result<Option<Shop>, LedgerError> {
    Ok(shops::table
        .filter(shops::tenant_id.eq(ctx.tenant_id()))
        .filter(shops::id.eq(id))
        .first::<Shop>(conn)
        .optional()?)
}

/// List shops, optionally restricted to a set of ids
pub fn list_shops(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    only_ids: Option<&[String]>,
) -> Result<Vec<Shop>, LedgerError> {
    let mut q = shops::table
        .filter(shops::tenant_id.eq(ctx.tenant_id()))
        .into_boxed();

    if let Some(ids) = only_ids {
        q = q.filter(shops::id.eq_any(ids));
    }

    Ok(q.order((shops::name.asc(), shops::id.asc())).load::<Shop>(conn)?)
}

/// Delete a shop together with its shop-item and employee-shop rows
pub fn delete_shop(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    id: &str,
) -> Result<bool, LedgerError> {
    conn.transaction::<_, LedgerError, _>(|conn| {
        diesel::delete(
            shop_items::table
                .filter(shop_items::tenant_id.eq(ctx.tenant_id()))
                .filter(shop_items::shop_id.eq(id)),
        )
        .execute(conn)?;

        diesel::delete(
            employee_shops::table
                .filter(employee_shops::tenant_id.eq(ctx.tenant_id()))
                .filter(employee_shops::shop_id.eq(id)),
        )
        .execute(conn)?;

        let deleted = diesel::delete(
            shops::table
                .filter(shops::tenant_id.eq(ctx.tenant_id()))
                .filter(shops::id.eq(id)),
        )
        .execute(conn)?;

        Ok(deleted > 0)
    })
}

// ============================================================================
// Categories
// ============================================================================

pub fn create_category(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    input: &CreateCategoryInput,
) -> Result<Category, LedgerError> {
    let id = Uuid::new_v4().to_string();
    let now = current_timestamp();

    diesel::insert_into(categories::table)
        .values(&NewCategory {
            id: &id,
            tenant_id: ctx.tenant_id(),
            name: &input.name,
            sort_order: input.sort_order,
            created_at: &now,
        })
        .execute(conn)?;

    debug!(category_id = %id, name = %input.name, "Created category");

    categories::table
        .filter(categories::tenant_id.eq(ctx.tenant_id()))
        .filter(categories::id.eq(&id))
        .first::<Category>(conn)
        .map_err(LedgerError::from)
}

/// List categories in display order
pub fn list_categories(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
) -> Result<Vec<Category>, LedgerError> {
    Ok(categories::table
        .filter(categories::tenant_id.eq(ctx.tenant_id()))
        .order((categories::sort_order.asc(), categories::name.asc(), categories::id.asc()))
        .load::<Category>(conn)?)
}

/// Find a category by name, ignoring case and surrounding whitespace
pub fn find_category_by_name(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    name: &str,
) -> Result<Option<Category>, LedgerError> {
    let wanted = name.trim().to_lowercase();
    Ok(list_categories(conn, ctx)?
        .into_iter()
        .find(|c| c.name.trim().to_lowercase() == wanted))
}

// ============================================================================
// Items
// ============================================================================

pub fn create_item(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    input: &CreateItemInput,
) -> Result<Item, LedgerError> {
    let id = Uuid::new_v4().to_string();
    let now = current_timestamp();

    diesel::insert_into(items::table)
        .values(&NewItem {
            id: &id,
            tenant_id: ctx.tenant_id(),
            name: &input.name,
            pack_size: input.pack_size.as_deref(),
            category_id: input.category_id.as_deref(),
            created_at: &now,
        })
        .execute(conn)?;

    get_item(conn, ctx, &id)?
        .ok_or_else(|| LedgerError::Internal("Failed to retrieve created item".into()))
}

pub fn get_item(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    id: &str,
) -> Result<Option<Item>, LedgerError> {
    Ok(items::table
        .filter(items::tenant_id.eq(ctx.tenant_id()))
        .filter(items::id.eq(id))
        .first::<Item>(conn)
        .optional()?)
}

/// List items, optionally restricted to a set of ids
pub fn list_items(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    only_ids: Option<&[String]>,
) -> Result<Vec<Item>, LedgerError> {
    let mut q = items::table
        .filter(items::tenant_id.eq(ctx.tenant_id()))
        .into_boxed();

    if let Some(ids) = only_ids {
        q = q.filter(items::id.eq_any(ids));
    }

    Ok(q.order((items::name.asc(), items::id.asc())).load::<Item>(conn)?)
}

pub fn delete_item(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    id: &str,
) -> Result<bool, LedgerError> {
    conn.transaction::<_, LedgerError, _>(|conn| {
        diesel::delete(
            shop_items::table
                .filter(shop_items::tenant_id.eq(ctx.tenant_id()))
                .filter(shop_items::item_id.eq(id)),
        )
        .execute(conn)?;

        let deleted = diesel::delete(
            items::table
                .filter(items::tenant_id.eq(ctx.tenant_id()))
                .filter(items::id.eq(id)),
        )
        .execute(conn)?;

        Ok(deleted > 0)
    })
}

// ============================================================================
// Shop Item Assignments
// ============================================================================

/// Item ids assigned to a shop
pub fn shop_item_ids(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    shop_id: &str,
) -> Result<Vec<String>, LedgerError> {
    Ok(shop_items::table
        .filter(shop_items::tenant_id.eq(ctx.tenant_id()))
        .filter(shop_items::shop_id.eq(shop_id))
        .select(shop_items::item_id)
        .order(shop_items::item_id.asc())
        .load::<String>(conn)?)
}

/// All shop item assignments of the tenant
pub fn list_shop_items(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
) -> Result<Vec<ShopItem>, LedgerError> {
    Ok(shop_items::table
        .filter(shop_items::tenant_id.eq(ctx.tenant_id()))
        .load::<ShopItem>(conn)?)
}

/// Replace the full item set of a shop
pub fn set_shop_items(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    shop_id: &str,
    item_ids: &[String],
) -> Result<usize, LedgerError> {
    conn.transaction::<_, LedgerError, _>(|conn| {
        diesel::delete(
            shop_items::table
                .filter(shop_items::tenant_id.eq(ctx.tenant_id()))
                .filter(shop_items::shop_id.eq(shop_id)),
        )
        .execute(conn)?;

        let mut inserted = 0;
        for item_id in item_ids {
            inserted += diesel::insert_or_ignore_into(shop_items::table)
                .values(&ShopItem {
                    tenant_id: ctx.tenant_id.clone(),
                    shop_id: shop_id.to_string(),
                    item_id: item_id.clone(),
                })
                .execute(conn)?;
        }

        Ok(inserted)
    })
}

// ============================================================================
// Employee Shop Assignments
// ============================================================================

pub fn assign_employee_shop(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    user_id: &str,
    shop_id: &str,
) -> Result<bool, LedgerError> {
    let now = current_timestamp();
    let inserted = diesel::insert_or_ignore_into(employee_shops::table)
        .values(&NewEmployeeShop {
            tenant_id: ctx.tenant_id(),
            user_id,
            shop_id,
            created_at: &now,
        })
        .execute(conn)?;

    Ok(inserted > 0)
}

pub fn unassign_employee_shop(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    user_id: &str,
    shop_id: &str,
) -> Result<bool, LedgerError> {
    let deleted = diesel::delete(
        employee_shops::table
            .filter(employee_shops::tenant_id.eq(ctx.tenant_id()))
            .filter(employee_shops::user_id.eq(user_id))
            .filter(employee_shops::shop_id.eq(shop_id)),
    )
    .execute(conn)?;

    Ok(deleted > 0)
}

/// Shop ids an employee is assigned to
pub fn employee_shop_ids(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    user_id: &str,
) -> Result<Vec<String>, LedgerError> {
    Ok(employee_shops::table
        .filter(employee_shops::tenant_id.eq(ctx.tenant_id()))
        .filter(employee_shops::user_id.eq(user_id))
        .select(employee_shops::shop_id)
        .load::<String>(conn)?)
}

pub fn employee_has_shop(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    user_id: &str,
    shop_id: &str,
) -> Result<bool, LedgerError> {
    let row = employee_shops::table
        .filter(employee_shops::tenant_id.eq(ctx.tenant_id()))
        .filter(employee_shops::user_id.eq(user_id))
        .filter(employee_shops::shop_id.eq(shop_id))
        .first::<EmployeeShop>(conn)
        .optional()?;

    Ok(row.is_some())
}
