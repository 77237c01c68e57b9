//! Export service - per-shop count sheets for a session
//!
//! [`build_workbook`] is a pure projection over fetched rows. Every ordering
//! is decided by sort keys on the rows themselves, so the result does not
//! depend on the order in which rows were loaded. Two sinks render it: the
//! JSON view and a ZIP archive holding one CSV sheet per shop.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Write};
use std::sync::Arc;

use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::auth::{authorize, Actor};
use crate::db::models::ShopItem;
use crate::db::{
    catalog, sessions, stock_counts, Category, CountSession, Item, LedgerDb, Shop, StockCount,
};
use crate::error::LedgerError;

pub const UNCATEGORIZED: &str = "Uncategorized";

const SHEET_HEADERS: [&str; 5] = ["Category", "Item", "Pack Size", "Boxes", "Singles"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub category: String,
    pub item_id: String,
    pub item_name: String,
    pub pack_size: Option<String>,
    pub boxes: i32,
    pub singles: i32,
}

/// One shop's sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub shop_id: String,
    pub shop_name: String,
    pub rows: Vec<SheetRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workbook {
    pub session_id: String,
    pub session_name: String,
    pub sheets: Vec<Sheet>,
}

/// Rows needed to export one session
pub struct ExportInput<'a> {
    pub session: &'a CountSession,
    pub shops: &'a [Shop],
    pub categories: &'a [Category],
    pub items: &'a [Item],
    pub shop_items: &'a [ShopItem],
    pub counts: &'a [StockCount],
}

/// Project a session's counts into one sheet per shop
///
/// Shops are ordered by (name, id); categories by (sort_order, name, id) with
/// uncategorized items last; items by (name, id). Only items assigned to a
/// shop appear on its sheet; a missing count is reported as (0, 0).
pub fn build_workbook(input: &ExportInput<'_>) -> Workbook {
    // Category rank: position in display order, uncategorized after all
    let mut categories: Vec<&Category> = input.categories.iter().collect();
    categories.sort_by(|a, b| {
        (a.sort_order, &a.name, &a.id).cmp(&(b.sort_order, &b.name, &b.id))
    });
    let category_rank: HashMap<&str, (usize, &str)> = categories
        .iter()
        .enumerate()
        .map(|(rank, c)| (c.id.as_str(), (rank, c.name.as_str())))
        .collect();
    let uncategorized = (categories.len(), UNCATEGORIZED);

    let items: HashMap<&str, &Item> = input.items.iter().map(|i| (i.id.as_str(), i)).collect();

    let counts: HashMap<(&str, &str), (i32, i32)> = input
        .counts
        .iter()
        .filter(|c| c.session_id == input.session.id)
        .map(|c| ((c.shop_id.as_str(), c.item_id.as_str()), (c.boxes, c.singles)))
        .collect();

    let mut assigned: HashMap<&str, Vec<&Item>> = HashMap::new();
    for link in input.shop_items {
        if let Some(item) = items.get(link.item_id.as_str()) {
            assigned.entry(link.shop_id.as_str()).or_default().push(item);
        }
    }

    let mut shops: Vec<&Shop> = input.shops.iter().collect();
    shops.sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));

    let sheets = shops
        .into_iter()
        .map(|shop| {
            // (category rank, item name, item id) -> row; duplicate links collapse
            let mut ordered: BTreeMap<(usize, &str, &str), SheetRow> = BTreeMap::new();

            for item in assigned.get(shop.id.as_str()).into_iter().flatten() {
                let (rank, category) = item
                    .category_id
                    .as_deref()
                    .and_then(|id| category_rank.get(id).copied())
                    .unwrap_or(uncategorized);

                let (boxes, singles) = counts
                    .get(&(shop.id.as_str(), item.id.as_str()))
                    .copied()
                    .unwrap_or((0, 0));

                ordered.insert(
                    (rank, item.name.as_str(), item.id.as_str()),
                    SheetRow {
                        category: category.to_string(),
                        item_id: item.id.clone(),
                        item_name: item.name.clone(),
                        pack_size: item.pack_size.clone(),
                        boxes,
                        singles,
                    },
                );
            }

            Sheet {
                shop_id: shop.id.clone(),
                shop_name: shop.name.clone(),
                rows: ordered.into_values().collect(),
            }
        })
        .collect();

    Workbook {
        session_id: input.session.id.clone(),
        session_name: input.session.name.clone(),
        sheets,
    }
}

/// Render one sheet as CSV with a header row
pub fn sheet_to_csv(sheet: &Sheet) -> Result<Vec<u8>, LedgerError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(SHEET_HEADERS)?;

    for row in &sheet.rows {
        let boxes = row.boxes.to_string();
        let singles = row.singles.to_string();
        writer.write_record([
            row.category.as_str(),
            row.item_name.as_str(),
            row.pack_size.as_deref().unwrap_or(""),
            boxes.as_str(),
            singles.as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| LedgerError::Internal(format!("Failed to flush CSV sheet: {}", e)))
}

/// File-system safe name fragment
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == ' ' { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        "shop".to_string()
    } else {
        cleaned
    }
}

/// Sheet file names, numbered in sheet order so equal shop names stay distinct
pub fn sheet_file_names(workbook: &Workbook) -> Vec<String> {
    workbook
        .sheets
        .iter()
        .enumerate()
        .map(|(i, sheet)| format!("{:02}-{}.csv", i + 1, sanitize_file_name(&sheet.shop_name)))
        .collect()
}

/// Suggested download name for the archive
pub fn archive_file_name(workbook: &Workbook) -> String {
    format!("{}.zip", sanitize_file_name(&workbook.session_name))
}

/// Bundle every sheet into a ZIP archive
pub fn workbook_to_zip(workbook: &Workbook) -> Result<Vec<u8>, LedgerError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (sheet, file_name) in workbook.sheets.iter().zip(sheet_file_names(workbook)) {
        zip.start_file(file_name, options)?;
        zip.write_all(&sheet_to_csv(sheet)?)?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Export service for business logic
pub struct ExportService {
    db: Arc<LedgerDb>,
}

impl ExportService {
    pub fn new(db: Arc<LedgerDb>) -> Self {
        Self { db }
    }

    /// Load every row the export needs and project it
    pub fn workbook(&self, actor: &Actor, session_id: &str) -> Result<Workbook, LedgerError> {
        authorize(actor, "export_session")?;
        let ctx = actor.ctx();

        let workbook = self.db.with_conn(|conn| {
            let session = sessions::get_session(conn, ctx, session_id)?
                .ok_or_else(|| LedgerError::NotFound(format!("Session {} not found", session_id)))?;

            let shops = catalog::list_shops(conn, ctx, None)?;
            let categories = catalog::list_categories(conn, ctx)?;
            let items = catalog::list_items(conn, ctx, None)?;
            let shop_items = catalog::list_shop_items(conn, ctx)?;
            let counts = stock_counts::counts_for_session(conn, ctx, session_id)?;

            Ok(build_workbook(&ExportInput {
                session: &session,
                shops: &shops,
                categories: &categories,
                items: &items,
                shop_items: &shop_items,
                counts: &counts,
            }))
        })?;

        info!(
            tenant = %ctx.tenant_id(),
            session_id = %session_id,
            actor = %actor.user_id,
            sheets = workbook.sheets.len(),
            "Session exported"
        );

        Ok(workbook)
    }

    /// Export as a ZIP archive; returns (file name, bytes)
    pub fn archive(
        &self,
        actor: &Actor,
        session_id: &str,
    ) -> Result<(String, Vec<u8>), LedgerError> {
        let workbook = self.workbook(actor, session_id)?;
        let bytes = workbook_to_zip(&workbook)?;
        Ok((archive_file_name(&workbook), bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn session() -> CountSession {
        CountSession {
            id: "s-1".into(),
            tenant_id: "default".into(),
            name: "March count".into(),
            status: "completed".into(),
            created_by: "mgr-1".into(),
            created_at: "2026-03-01T09:00:00.000Z".into(),
            completed_at: Some("2026-03-01T17:00:00.000Z".into()),
        }
    }

    fn shop(id: &str, name: &str) -> Shop {
        Shop {
            id: id.into(),
            tenant_id: "default".into(),
            name: name.into(),
            created_at: String::new(),
        }
    }

    fn category(id: &str, name: &str, sort_order: i32) -> Category {
        Category {
            id: id.into(),
            tenant_id: "default".into(),
            name: name.into(),
            sort_order,
            created_at: String::new(),
        }
    }

    fn item(id: &str, name: &str, category_id: Option<&str>) -> Item {
        Item {
            id: id.into(),
            tenant_id: "default".into(),
            name: name.into(),
            pack_size: Some("12".into()),
            category_id: category_id.map(Into::into),
            created_at: String::new(),
        }
    }

    fn link(shop_id: &str, item_id: &str) -> ShopItem {
        ShopItem {
            tenant_id: "default".into(),
            shop_id: shop_id.into(),
            item_id: item_id.into(),
        }
    }

    fn count(shop_id: &str, item_id: &str, boxes: i32, singles: i32) -> StockCount {
        StockCount {
            tenant_id: "default".into(),
            session_id: "s-1".into(),
            shop_id: shop_id.into(),
            item_id: item_id.into(),
            boxes,
            singles,
            counted_by: "emp-1".into(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_rows_grouped_by_category_with_uncategorized_last() {
        let session = session();
        let shops = vec![shop("h", "Harbour")];
        let categories = vec![category("drinks", "Drinks", 2), category("snacks", "Snacks", 1)];
        let items = vec![
            item("cola", "Cola", Some("drinks")),
            item("bags", "Bags", None),
            item("crisps", "Crisps", Some("snacks")),
        ];
        let shop_items = vec![link("h", "cola"), link("h", "bags"), link("h", "crisps")];
        let counts = vec![count("h", "cola", 3, 1)];

        let workbook = build_workbook(&ExportInput {
            session: &session,
            shops: &shops,
            categories: &categories,
            items: &items,
            shop_items: &shop_items,
            counts: &counts,
        });

        let rows = &workbook.sheets[0].rows;
        let order: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.category.as_str(), r.item_name.as_str()))
            .collect();
        assert_eq!(order, vec![("Snacks", "Crisps"), ("Drinks", "Cola"), (UNCATEGORIZED, "Bags")]);
        assert_eq!((rows[1].boxes, rows[1].singles), (3, 1));
        assert_eq!((rows[0].boxes, rows[0].singles), (0, 0));
    }

    #[test]
    fn test_unassigned_items_not_exported() {
        let session = session();
        let shops = vec![shop("h", "Harbour"), shop("q", "Quay")];
        let items = vec![item("cola", "Cola", None)];
        let shop_items = vec![link("h", "cola")];

        let workbook = build_workbook(&ExportInput {
            session: &session,
            shops: &shops,
            categories: &[],
            items: &items,
            shop_items: &shop_items,
            counts: &[],
        });

        assert_eq!(workbook.sheets.len(), 2);
        assert_eq!(workbook.sheets[0].rows.len(), 1);
        assert!(workbook.sheets[1].rows.is_empty());
    }

    #[test]
    fn test_zip_contains_one_csv_per_shop() {
        let session = session();
        let shops = vec![shop("a", "Harbour"), shop("b", "Harbour")];
        let items = vec![item("cola", "Cola", None)];
        let shop_items = vec![link("a", "cola")];
        let counts = vec![count("a", "cola", 2, 5)];

        let workbook = build_workbook(&ExportInput {
            session: &session,
            shops: &shops,
            categories: &[],
            items: &items,
            shop_items: &shop_items,
            counts: &counts,
        });

        let bytes = workbook_to_zip(&workbook).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut first = String::new();
        archive.by_name("01-Harbour.csv").unwrap().read_to_string(&mut first).unwrap();
        assert_eq!(
            first,
            "Category,Item,Pack Size,Boxes,Singles\nUncategorized,Cola,12,2,5\n"
        );
        assert!(archive.by_name("02-Harbour.csv").is_ok());
        assert_eq!(archive_file_name(&workbook), "March count.zip");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("North/East: Depot"), "North_East_ Depot");
        assert_eq!(sanitize_file_name("  "), "shop");
    }
}
