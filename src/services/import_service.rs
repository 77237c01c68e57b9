//! Import service - bulk item creation from a Name / Pack Size / Category table
//!
//! Rows are independent: a failing row is recorded and skipped, later rows
//! still run. Categories are matched ignoring case; a name not seen before is
//! created once and reused by every later row that mentions it.

use std::collections::HashMap;
use std::sync::Arc;

use diesel::SqliteConnection;
use tracing::{info, warn};

use crate::auth::{authorize, Actor};
use crate::db::catalog::{self, CreateCategoryInput, CreateItemInput};
use crate::db::{LedgerDb, TenantContext};
use crate::error::LedgerError;

use super::events::{EventBus, LedgerEvent};

/// One input row as read from the upload
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportRow {
    pub name: String,
    pub pack_size: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub imported: usize,
    pub failed: usize,
    pub skipped: usize,
    pub categories_created: usize,
    pub errors: Vec<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Parse CSV text with a header row naming `Name`, `Pack Size` and `Category`
///
/// Header matching ignores case and surrounding whitespace; columns may come
/// in any order and unknown columns are ignored. Only `Name` is required.
pub fn parse_csv(text: &str) -> Result<Vec<ImportRow>, LedgerError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let column = |wanted: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(wanted))
    };

    let name_col = column("name")
        .ok_or_else(|| LedgerError::InvalidInput("CSV is missing a Name column".into()))?;
    let pack_col = column("pack size");
    let category_col = column("category");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(ImportRow {
            name: record.get(name_col).unwrap_or("").trim().to_string(),
            pack_size: non_empty(pack_col.and_then(|i| record.get(i))),
            category: non_empty(category_col.and_then(|i| record.get(i))),
        });
    }

    Ok(rows)
}

/// Case-insensitive category lookup that remembers categories it creates
struct CategoryResolver {
    by_name: HashMap<String, String>,
    created: usize,
}

impl CategoryResolver {
    fn load(conn: &mut SqliteConnection, ctx: &TenantContext) -> Result<Self, LedgerError> {
        let mut by_name = HashMap::new();
        // Display order, so the first of any case-variant duplicates wins
        for category in catalog::list_categories(conn, ctx)? {
            by_name
                .entry(category.name.trim().to_lowercase())
                .or_insert(category.id);
        }
        Ok(Self { by_name, created: 0 })
    }

    fn resolve(
        &mut self,
        conn: &mut SqliteConnection,
        ctx: &TenantContext,
        name: &str,
    ) -> Result<String, LedgerError> {
        let key = name.trim().to_lowercase();
        if let Some(id) = self.by_name.get(&key) {
            return Ok(id.clone());
        }

        let category = catalog::create_category(
            conn,
            ctx,
            &CreateCategoryInput {
                name: name.trim().to_string(),
                sort_order: 0,
            },
        )?;
        self.created += 1;
        self.by_name.insert(key, category.id.clone());
        Ok(category.id)
    }
}

fn import_one(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    resolver: &mut CategoryResolver,
    name: &str,
    row: &ImportRow,
) -> Result<(), LedgerError> {
    let category_id = match non_empty(row.category.as_deref()) {
        Some(category) => Some(resolver.resolve(conn, ctx, &category)?),
        None => None,
    };

    catalog::create_item(
        conn,
        ctx,
        &CreateItemInput {
            name: name.to_string(),
            pack_size: non_empty(row.pack_size.as_deref()),
            category_id,
        },
    )?;

    Ok(())
}

/// Import service for business logic
pub struct ImportService {
    db: Arc<LedgerDb>,
    events: Arc<EventBus>,
}

impl ImportService {
    pub fn new(db: Arc<LedgerDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// Import items from CSV text
    pub fn import_csv(&self, actor: &Actor, text: &str) -> Result<ImportResult, LedgerError> {
        authorize(actor, "import_items")?;
        let rows = parse_csv(text)?;
        self.import_rows(actor, rows)
    }

    /// Import already parsed rows
    ///
    /// Error messages number rows from 1 in input order, header excluded.
    pub fn import_rows(
        &self,
        actor: &Actor,
        rows: Vec<ImportRow>,
    ) -> Result<ImportResult, LedgerError> {
        authorize(actor, "import_items")?;
        let ctx = actor.ctx();

        let result = self.db.with_conn(|conn| {
            let mut resolver = CategoryResolver::load(conn, ctx)?;
            let mut result = ImportResult::default();

            for (index, row) in rows.into_iter().enumerate() {
                let row_number = index + 1;
                let name = row.name.trim();
                if name.is_empty() {
                    result.skipped += 1;
                    continue;
                }

                match import_one(conn, ctx, &mut resolver, name, &row) {
                    Ok(_) => result.imported += 1,
                    Err(e) => {
                        warn!(row = row_number, error = %e, "Import row failed");
                        result.failed += 1;
                        result.errors.push(format!("row {}: {}", row_number, e));
                    }
                }
            }

            result.categories_created = resolver.created;
            Ok(result)
        })?;

        info!(
            tenant = %ctx.tenant_id(),
            actor = %actor.user_id,
            imported = result.imported,
            failed = result.failed,
            skipped = result.skipped,
            categories_created = result.categories_created,
            "Item import finished"
        );

        self.events.emit(LedgerEvent::ItemsImported {
            tenant: ctx.tenant_id().to_string(),
            imported: result.imported,
            failed: result.failed,
            categories_created: result.categories_created,
        });

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_any_column_order() {
        let csv = "\u{feff}category, NAME ,Pack size,Notes\nDrinks,Cola,24,x\n,Crisps,,\n";
        let rows = parse_csv(csv).unwrap();
        assert_eq!(
            rows,
            vec![
                ImportRow {
                    name: "Cola".into(),
                    pack_size: Some("24".into()),
                    category: Some("Drinks".into()),
                },
                ImportRow {
                    name: "Crisps".into(),
                    pack_size: None,
                    category: None,
                },
            ]
        );
    }

    #[test]
    fn test_parse_csv_requires_name_column() {
        let err = parse_csv("Item,Category\nCola,Drinks\n").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    #[test]
    fn test_parse_csv_short_rows() {
        let rows = parse_csv("Name,Pack Size,Category\nCola\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Cola");
        assert!(rows[0].category.is_none());
    }

    #[test]
    fn test_category_created_once() {
        let db = Arc::new(LedgerDb::open_in_memory().unwrap());
        let svc = ImportService::new(db.clone(), Arc::new(EventBus::new()));
        let manager = Actor::manager("mgr-1", TenantContext::default());

        let rows = vec![
            ImportRow { name: "Cola".into(), pack_size: None, category: None },
            ImportRow {
                name: "Lemonade".into(),
                pack_size: Some("6".into()),
                category: Some("Drinks".into()),
            },
            ImportRow { name: "".into(), pack_size: None, category: Some("Ignored".into()) },
            ImportRow { name: "Tonic".into(), pack_size: None, category: Some(" drinks ".into()) },
        ];

        let result = svc.import_rows(&manager, rows).unwrap();
        assert_eq!(result.imported, 3);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(result.categories_created, 1);

        let categories = db
            .with_conn(|conn| catalog::list_categories(conn, &TenantContext::default()))
            .unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Drinks");
    }
}
