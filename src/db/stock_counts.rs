//! Stock count rows
//!
//! One row per (tenant, session, shop, item). Writes are upserts keyed on that
//! tuple, so concurrent writers to the same row resolve as last writer wins.

use diesel::prelude::*;

use super::context::TenantContext;
use super::diesel_schema::stock_counts;
use super::models::{current_timestamp, NewStockCount, StockCount};
use crate::error::LedgerError;

/// A single quantity to record, already clamped by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountValue<'a> {
    pub item_id: &'a str,
    pub boxes: i32,
    pub singles: i32,
}

/// Insert or replace every given count for one shop in one session.
///
/// Runs in the caller's transaction. Returns the number of rows written.
pub fn upsert_counts(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    session_id: &str,
    shop_id: &str,
    counted_by: &str,
    values: &[CountValue<'_>],
) -> Result<usize, LedgerError> {
    let now = current_timestamp();
    let mut written = 0;

    for value in values {
        written += diesel::insert_into(stock_counts::table)
            .values(&NewStockCount {
                tenant_id: ctx.tenant_id(),
                session_id,
                shop_id,
                item_id: value.item_id,
                boxes: value.boxes,
                singles: value.singles,
                counted_by,
                updated_at: &now,
            })
            .on_conflict((
                stock_counts::tenant_id,
                stock_counts::session_id,
                stock_counts::shop_id,
                stock_counts::item_id,
            ))
            .do_update()
            .set((
                stock_counts::boxes.eq(value.boxes),
                stock_counts::singles.eq(value.singles),
                stock_counts::counted_by.eq(counted_by),
                stock_counts::updated_at.eq(&now),
            ))
            .execute(conn)?;
    }

    Ok(written)
}

/// Counts recorded for one shop within a session, ordered by item id
pub fn counts_for_shop(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    session_id: &str,
    shop_id: &str,
) -> Result<Vec<StockCount>, LedgerError> {
    Ok(stock_counts::table
        .filter(stock_counts::tenant_id.eq(ctx.tenant_id()))
        .filter(stock_counts::session_id.eq(session_id))
        .filter(stock_counts::shop_id.eq(shop_id))
        .order(stock_counts::item_id.asc())
        .load::<StockCount>(conn)?)
}

/// Every count recorded in a session
pub fn counts_for_session(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    session_id: &str,
) -> Result<Vec<StockCount>, LedgerError> {
    Ok(stock_counts::table
        .filter(stock_counts::tenant_id.eq(ctx.tenant_id()))
        .filter(stock_counts::session_id.eq(session_id))
        .order((stock_counts::shop_id.asc(), stock_counts::item_id.asc()))
        .load::<StockCount>(conn)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_schema;
    use crate::db::sessions::create_session;

    fn setup_test_db() -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:")
            .expect("Failed to create in-memory database");
        init_schema(&mut conn).expect("Failed to init schema");
        conn
    }

    #[test]
    fn test_upsert_replaces_existing_row() {
        let mut conn = setup_test_db();
        let ctx = TenantContext::default();
        let session = create_session(&mut conn, &ctx, "May", "mgr-1").unwrap();

        let first = [CountValue { item_id: "cola", boxes: 3, singles: 2 }];
        upsert_counts(&mut conn, &ctx, &session.id, "shop-1", "emp-1", &first).unwrap();

        let second = [CountValue { item_id: "cola", boxes: 5, singles: 0 }];
        upsert_counts(&mut conn, &ctx, &session.id, "shop-1", "emp-2", &second).unwrap();

        let rows = counts_for_shop(&mut conn, &ctx, &session.id, "shop-1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].boxes, rows[0].singles), (5, 0));
        assert_eq!(rows[0].counted_by, "emp-2");
    }

    #[test]
    fn test_counts_are_scoped_per_shop() {
        let mut conn = setup_test_db();
        let ctx = TenantContext::default();
        let session = create_session(&mut conn, &ctx, "June", "mgr-1").unwrap();

        let values = [
            CountValue { item_id: "cola", boxes: 1, singles: 0 },
            CountValue { item_id: "lemonade", boxes: 0, singles: 4 },
        ];
        upsert_counts(&mut conn, &ctx, &session.id, "shop-1", "emp-1", &values).unwrap();
        upsert_counts(&mut conn, &ctx, &session.id, "shop-2", "emp-1", &values[..1]).unwrap();

        assert_eq!(counts_for_shop(&mut conn, &ctx, &session.id, "shop-1").unwrap().len(), 2);
        assert_eq!(counts_for_shop(&mut conn, &ctx, &session.id, "shop-2").unwrap().len(), 1);
        assert_eq!(counts_for_session(&mut conn, &ctx, &session.id).unwrap().len(), 3);
    }

    #[test]
    fn test_negative_quantity_rejected_by_schema() {
        let mut conn = setup_test_db();
        let ctx = TenantContext::default();
        let session = create_session(&mut conn, &ctx, "July", "mgr-1").unwrap();

        let bad = [CountValue { item_id: "cola", boxes: -1, singles: 0 }];
        assert!(upsert_counts(&mut conn, &ctx, &session.id, "shop-1", "emp-1", &bad).is_err());
    }
}
