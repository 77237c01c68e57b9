//! View types for HTTP API boundary
//!
//! These types use camelCase serialization for TypeScript clients.
//! Row types in db/models.rs use snake_case for database compatibility.
//!
//! Pattern:
//! - Services return row types (CountSession, StockCount, etc.)
//! - The HTTP layer converts to View types (SessionView, StockCountView, etc.)
//! - ts-rs generates camelCase TypeScript from View types
//!
//! InputView types (suffix InputView) accept camelCase JSON from the web
//! client and convert into service inputs.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::db::catalog::{CreateCategoryInput, CreateItemInput, CreateShopInput};
use crate::db::models::{Category, CountSession, Item, SessionAssignment, Shop, StockCount};
use crate::db::DbStats;
use crate::services::count_service::CountEntry;
use crate::services::export_service::{Sheet, SheetRow, Workbook};
use crate::services::import_service::{ImportResult, ImportRow};
use crate::services::session_service::CreatedSession;

// ============================================================================
// Session Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionView {
    pub id: String,
    pub name: String,
    pub status: String,
    pub created_by: String,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl From<CountSession> for SessionView {
    fn from(s: CountSession) -> Self {
        Self {
            id: s.id,
            name: s.name,
            status: s.status,
            created_by: s.created_by,
            created_at: s.created_at,
            completed_at: s.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreatedSessionView {
    pub session: SessionView,
    pub assigned: u32,
    pub assignment_failures: u32,
}

impl From<CreatedSession> for CreatedSessionView {
    fn from(c: CreatedSession) -> Self {
        Self {
            session: c.session.into(),
            assigned: c.assigned as u32,
            assignment_failures: c.assignment_failures as u32,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AssignmentView {
    pub session_id: String,
    pub user_id: String,
    pub created_at: String,
}

impl From<SessionAssignment> for AssignmentView {
    fn from(a: SessionAssignment) -> Self {
        Self {
            session_id: a.session_id,
            user_id: a.user_id,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateSessionInputView {
    pub name: String,
    #[serde(default)]
    pub assignees: Vec<String>,
}

// ============================================================================
// Count Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockCountView {
    pub session_id: String,
    pub shop_id: String,
    pub item_id: String,
    pub boxes: i32,
    pub singles: i32,
    pub counted_by: String,
    pub updated_at: String,
}

impl From<StockCount> for StockCountView {
    fn from(c: StockCount) -> Self {
        Self {
            session_id: c.session_id,
            shop_id: c.shop_id,
            item_id: c.item_id,
            boxes: c.boxes,
            singles: c.singles,
            counted_by: c.counted_by,
            updated_at: c.updated_at,
        }
    }
}

/// Raw quantities as typed by the user; clamped server-side
#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CountEntryInputView {
    pub item_id: String,
    #[serde(default)]
    #[ts(type = "number")]
    pub boxes: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub singles: i64,
}

impl From<CountEntryInputView> for CountEntry {
    fn from(v: CountEntryInputView) -> Self {
        Self {
            item_id: v.item_id,
            boxes: v.boxes,
            singles: v.singles,
        }
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaveCountsInputView {
    pub entries: Vec<CountEntryInputView>,
}

// ============================================================================
// Catalog Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ShopView {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

impl From<Shop> for ShopView {
    fn from(s: Shop) -> Self {
        Self {
            id: s.id,
            name: s.name,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategoryView {
    pub id: String,
    pub name: String,
    pub sort_order: i32,
}

impl From<Category> for CategoryView {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
            sort_order: c.sort_order,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ItemView {
    pub id: String,
    pub name: String,
    pub pack_size: Option<String>,
    pub category_id: Option<String>,
}

impl From<Item> for ItemView {
    fn from(i: Item) -> Self {
        Self {
            id: i.id,
            name: i.name,
            pack_size: i.pack_size,
            category_id: i.category_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateShopInputView {
    pub name: String,
}

impl From<CreateShopInputView> for CreateShopInput {
    fn from(v: CreateShopInputView) -> Self {
        Self { name: v.name }
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateCategoryInputView {
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
}

impl From<CreateCategoryInputView> for CreateCategoryInput {
    fn from(v: CreateCategoryInputView) -> Self {
        Self {
            name: v.name,
            sort_order: v.sort_order,
        }
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateItemInputView {
    pub name: String,
    #[serde(default)]
    pub pack_size: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
}

impl From<CreateItemInputView> for CreateItemInput {
    fn from(v: CreateItemInputView) -> Self {
        Self {
            name: v.name,
            pack_size: v.pack_size,
            category_id: v.category_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SetShopItemsInputView {
    pub item_ids: Vec<String>,
}

// ============================================================================
// Export Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct WorkbookRowView {
    pub category: String,
    pub item_id: String,
    pub item_name: String,
    pub pack_size: Option<String>,
    pub boxes: i32,
    pub singles: i32,
}

impl From<SheetRow> for WorkbookRowView {
    fn from(r: SheetRow) -> Self {
        Self {
            category: r.category,
            item_id: r.item_id,
            item_name: r.item_name,
            pack_size: r.pack_size,
            boxes: r.boxes,
            singles: r.singles,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SheetView {
    pub shop_id: String,
    pub shop_name: String,
    pub rows: Vec<WorkbookRowView>,
}

impl From<Sheet> for SheetView {
    fn from(s: Sheet) -> Self {
        Self {
            shop_id: s.shop_id,
            shop_name: s.shop_name,
            rows: s.rows.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct WorkbookView {
    pub session_id: String,
    pub session_name: String,
    pub sheets: Vec<SheetView>,
}

impl From<Workbook> for WorkbookView {
    fn from(w: Workbook) -> Self {
        Self {
            session_id: w.session_id,
            session_name: w.session_name,
            sheets: w.sheets.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Import Views
// ============================================================================

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImportRowInputView {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pack_size: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl From<ImportRowInputView> for ImportRow {
    fn from(v: ImportRowInputView) -> Self {
        Self {
            name: v.name,
            pack_size: v.pack_size,
            category: v.category,
        }
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImportItemsInputView {
    pub rows: Vec<ImportRowInputView>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImportResultView {
    pub imported: u32,
    pub failed: u32,
    pub skipped: u32,
    pub categories_created: u32,
    pub errors: Vec<String>,
}

impl From<ImportResult> for ImportResultView {
    fn from(r: ImportResult) -> Self {
        Self {
            imported: r.imported as u32,
            failed: r.failed as u32,
            skipped: r.skipped as u32,
            categories_created: r.categories_created as u32,
            errors: r.errors,
        }
    }
}

// ============================================================================
// Health View
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HealthView {
    pub status: String,
    pub version: String,
}

impl HealthView {
    pub fn alive() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Row counts for one tenant
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StatsView {
    pub shops: u32,
    pub items: u32,
    pub active_sessions: u32,
    pub count_rows: u32,
}

impl From<DbStats> for StatsView {
    fn from(stats: DbStats) -> Self {
        Self {
            shops: stats.shop_count as u32,
            items: stats.item_count as u32,
            active_sessions: stats.active_sessions as u32,
            count_rows: stats.count_rows as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_entry_input_is_camel_case() {
        let body = r#"{"entries":[{"itemId":"cola","boxes":-5},
            {"itemId":"lemonade","singles":10000000}]}"#;
        let input: SaveCountsInputView = serde_json::from_str(body).unwrap();
        assert_eq!(input.entries.len(), 2);
        assert_eq!(input.entries[0].boxes, -5);
        assert_eq!(input.entries[0].singles, 0);
        assert_eq!(input.entries[1].singles, 10_000_000);
    }

    #[test]
    fn test_session_view_serializes_camel_case() {
        let view = SessionView::from(CountSession {
            id: "s-1".into(),
            tenant_id: "default".into(),
            name: "March".into(),
            status: "active".into(),
            created_by: "mgr-1".into(),
            created_at: "2026-03-01T09:00:00.000Z".into(),
            completed_at: None,
        });
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["createdBy"], "mgr-1");
        assert!(json["completedAt"].is_null());
        assert!(json.get("tenantId").is_none());
    }
}
