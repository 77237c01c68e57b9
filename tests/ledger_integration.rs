//! Integration tests for the counting-session ledger
//!
//! These run the service layer end to end against in-memory databases, and a
//! temp-file database where two connections need to race.

use std::sync::{Arc, Barrier};
use std::thread;

use stockroom::config::{AccessConfig, LimitsConfig, UnassignedPolicy};
use stockroom::db::catalog::{CreateCategoryInput, CreateItemInput, CreateShopInput};
use stockroom::db::{Item, Shop};
use stockroom::services::count_service::CountEntry;
use stockroom::services::export_service::UNCATEGORIZED;
use stockroom::services::import_service::ImportRow;
use stockroom::{Actor, LedgerDb, LedgerError, Services, TenantContext};
use tempfile::TempDir;

fn manager() -> Actor {
    Actor::manager("mgr-1", TenantContext::default())
}

fn employee(user_id: &str) -> Actor {
    Actor::employee(user_id, TenantContext::default())
}

/// One shop with two assigned items, returned as (shop, item_a, item_b)
fn seed_shop(services: &Services, actor: &Actor) -> (Shop, Item, Item) {
    let shop = services
        .catalog
        .create_shop(actor, CreateShopInput { name: "High Street".into() })
        .unwrap();
    let a = services
        .catalog
        .create_item(
            actor,
            CreateItemInput {
                name: "Apples".into(),
                pack_size: Some("12".into()),
                category_id: None,
            },
        )
        .unwrap();
    let b = services
        .catalog
        .create_item(
            actor,
            CreateItemInput {
                name: "Bananas".into(),
                pack_size: None,
                category_id: None,
            },
        )
        .unwrap();
    services
        .catalog
        .set_shop_items(actor, &shop.id, &[a.id.clone(), b.id.clone()])
        .unwrap();
    (shop, a, b)
}

fn quantities(
    services: &Services,
    actor: &Actor,
    session_id: &str,
    shop_id: &str,
    item_id: &str,
) -> Option<(i32, i32)> {
    services
        .counts
        .counts_for_shop(actor, session_id, shop_id)
        .unwrap()
        .into_iter()
        .find(|c| c.item_id == item_id)
        .map(|c| (c.boxes, c.singles))
}

#[test]
fn test_session_lifecycle() {
    let services = Services::in_memory().unwrap();
    let mgr = manager();

    let created = services
        .sessions
        .create(&mgr, "  January count  ", &["emp-1".to_string(), "emp-2".to_string()])
        .unwrap();
    let session = created.session;
    assert_eq!(session.name, "January count");
    assert!(session.is_active());
    assert!(session.completed_at.is_none());
    assert_eq!(created.assigned, 2);
    assert_eq!(created.assignment_failures, 0);

    // Active sessions cannot be deleted
    let err = services.sessions.delete(&mgr, &session.id).unwrap_err();
    assert!(matches!(err, LedgerError::SessionStillActive(_)));

    let completed = services.sessions.complete(&mgr, &session.id).unwrap();
    assert!(completed.is_completed());
    assert!(completed.completed_at.is_some());

    let err = services.sessions.complete(&mgr, &session.id).unwrap_err();
    assert!(matches!(err, LedgerError::SessionAlreadyCompleted(_)));

    services.sessions.delete(&mgr, &session.id).unwrap();
    let err = services.sessions.get(&mgr, &session.id).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[test]
fn test_empty_session_name_rejected() {
    let services = Services::in_memory().unwrap();
    let err = services.sessions.create(&manager(), "   ", &[]).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));
}

#[test]
fn test_employee_cannot_manage_sessions() {
    let services = Services::in_memory().unwrap();
    let err = services.sessions.create(&employee("emp-1"), "Mine", &[]).unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
}

#[test]
fn test_concurrent_completion_single_winner() {
    let temp = TempDir::new().unwrap();
    let db = Arc::new(LedgerDb::open(&temp.path().join("ledger.db"), 4, 5000).unwrap());
    let services = Arc::new(Services::new(db, AccessConfig::default(), LimitsConfig::default()));
    let mgr = manager();

    let session = services.sessions.create(&mgr, "Race", &[]).unwrap().session;

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let services = services.clone();
            let barrier = barrier.clone();
            let id = session.id.clone();
            let mgr = mgr.clone();
            thread::spawn(move || {
                barrier.wait();
                services.sessions.complete(&mgr, &id)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let wins = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::SessionAlreadyCompleted(_))))
        .count();
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 1);

    let stored = services.sessions.get(&mgr, &session.id).unwrap();
    assert!(stored.is_completed());
    assert!(stored.completed_at.is_some());
}

#[test]
fn test_save_replaces_prior_quantities() {
    let services = Services::in_memory().unwrap();
    let mgr = manager();
    let (shop, a, b) = seed_shop(&services, &mgr);
    let session = services.sessions.create(&mgr, "Weekly", &[]).unwrap().session;

    services
        .counts
        .save_counts(&mgr, &session.id, &shop.id, &[CountEntry::new(&b.id, 2, 2)])
        .unwrap();

    let saved = services
        .counts
        .save_counts(
            &mgr,
            &session.id,
            &shop.id,
            &[CountEntry::new(&a.id, 3, 0), CountEntry::new(&b.id, 0, 5)],
        )
        .unwrap();
    assert_eq!(saved.len(), 2);

    assert_eq!(quantities(&services, &mgr, &session.id, &shop.id, &a.id), Some((3, 0)));
    assert_eq!(quantities(&services, &mgr, &session.id, &shop.id, &b.id), Some((0, 5)));
}

#[test]
fn test_zero_entry_is_a_no_op() {
    let services = Services::in_memory().unwrap();
    let mgr = manager();
    let (shop, a, b) = seed_shop(&services, &mgr);
    let session = services.sessions.create(&mgr, "Weekly", &[]).unwrap().session;

    services
        .counts
        .save_counts(&mgr, &session.id, &shop.id, &[CountEntry::new(&a.id, 4, 1)])
        .unwrap();

    // (0, 0) for A is dropped; B still makes the write set non-empty
    services
        .counts
        .save_counts(
            &mgr,
            &session.id,
            &shop.id,
            &[CountEntry::new(&a.id, 0, 0), CountEntry::new(&b.id, 1, 0)],
        )
        .unwrap();
    assert_eq!(quantities(&services, &mgr, &session.id, &shop.id, &a.id), Some((4, 1)));

    // Only zeros: nothing to save, nothing written
    let err = services
        .counts
        .save_counts(&mgr, &session.id, &shop.id, &[CountEntry::new(&a.id, 0, 0)])
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));
    assert_eq!(quantities(&services, &mgr, &session.id, &shop.id, &a.id), Some((4, 1)));
}

#[test]
fn test_quantities_are_clamped() {
    let services = Services::in_memory().unwrap();
    let mgr = manager();
    let (shop, a, _) = seed_shop(&services, &mgr);
    let session = services.sessions.create(&mgr, "Weekly", &[]).unwrap().session;

    services
        .counts
        .save_counts(&mgr, &session.id, &shop.id, &[CountEntry::new(&a.id, -5, 10_000_000)])
        .unwrap();
    assert_eq!(
        quantities(&services, &mgr, &session.id, &shop.id, &a.id),
        Some((0, 999_999))
    );

    services
        .counts
        .save_counts(&mgr, &session.id, &shop.id, &[CountEntry::new(&a.id, 10_000_000, -5)])
        .unwrap();
    assert_eq!(
        quantities(&services, &mgr, &session.id, &shop.id, &a.id),
        Some((999_999, 0))
    );
}

#[test]
fn test_save_after_completion_writes_nothing() {
    let services = Services::in_memory().unwrap();
    let mgr = manager();
    let (shop, a, _) = seed_shop(&services, &mgr);
    let emp = employee("emp-1");
    services.catalog.assign_employee_shop(&mgr, "emp-1", &shop.id).unwrap();

    let session = services
        .sessions
        .create(&mgr, "Weekly", &["emp-1".to_string()])
        .unwrap()
        .session;

    // Employee loaded the page, then the manager completed the session
    services.sessions.complete(&mgr, &session.id).unwrap();

    let err = services
        .counts
        .save_counts(&emp, &session.id, &shop.id, &[CountEntry::new(&a.id, 1, 1)])
        .unwrap_err();
    assert!(matches!(err, LedgerError::SessionNotActive(_)));
    assert!(services
        .counts
        .counts_for_shop(&mgr, &session.id, &shop.id)
        .unwrap()
        .is_empty());
}

#[test]
fn test_employee_needs_shop_assignment() {
    let services = Services::in_memory().unwrap();
    let mgr = manager();
    let (shop, a, _) = seed_shop(&services, &mgr);
    let session = services.sessions.create(&mgr, "Weekly", &[]).unwrap().session;
    let emp = employee("emp-1");

    let err = services
        .counts
        .save_counts(&emp, &session.id, &shop.id, &[CountEntry::new(&a.id, 1, 0)])
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    services.catalog.assign_employee_shop(&mgr, "emp-1", &shop.id).unwrap();
    services
        .counts
        .save_counts(&emp, &session.id, &shop.id, &[CountEntry::new(&a.id, 1, 0)])
        .unwrap();

    let visible = services.counts.visible_shops(&emp).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, shop.id);
}

#[test]
fn test_employee_session_visibility() {
    let services = Services::in_memory().unwrap();
    let mgr = manager();

    let first = services.sessions.create(&mgr, "First", &[]).unwrap().session;
    let second = services
        .sessions
        .create(&mgr, "Second", &["emp-2".to_string()])
        .unwrap()
        .session;

    // No assignments anywhere: every active session is visible
    let open = services.sessions.visible_sessions(&employee("emp-1")).unwrap();
    assert_eq!(open.len(), 2);

    // Sessions claimed by someone else are hidden; unclaimed ones stay open
    let open = services.sessions.visible_sessions(&employee("emp-3")).unwrap();
    assert_eq!(open.len(), 2);
    let third = services
        .sessions
        .create(&mgr, "Third", &["emp-3".to_string()])
        .unwrap()
        .session;
    let seen: Vec<String> = services
        .sessions
        .visible_sessions(&employee("emp-2"))
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(seen.len(), 2);
    assert!(seen.contains(&first.id) && seen.contains(&second.id));

    let err = services.sessions.get(&employee("emp-2"), &third.id).unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
}

#[test]
fn test_unassigned_session_open_after_earlier_assignment() {
    let services = Services::in_memory().unwrap();
    let mgr = manager();
    let (shop, a, _) = seed_shop(&services, &mgr);
    services.catalog.assign_employee_shop(&mgr, "emp-1", &shop.id).unwrap();

    let old = services
        .sessions
        .create(&mgr, "Old", &["emp-1".to_string()])
        .unwrap()
        .session;
    services.sessions.complete(&mgr, &old.id).unwrap();
    let new = services.sessions.create(&mgr, "New", &[]).unwrap().session;

    let emp = employee("emp-1");
    let visible = services.sessions.visible_sessions(&emp).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, new.id);

    services
        .counts
        .save_counts(&emp, &new.id, &shop.id, &[CountEntry::new(&a.id, 1, 2)])
        .unwrap();
    assert_eq!(quantities(&services, &mgr, &new.id, &shop.id, &a.id), Some((1, 2)));
}

#[test]
fn test_closed_policy_hides_unassigned_sessions() {
    let db = Arc::new(LedgerDb::open_in_memory().unwrap());
    let access = AccessConfig {
        unassigned_sessions: UnassignedPolicy::Closed,
        unassigned_shop_items: UnassignedPolicy::Closed,
    };
    let services = Services::new(db, access, LimitsConfig::default());
    let mgr = manager();
    services.sessions.create(&mgr, "First", &[]).unwrap();

    assert!(services
        .sessions
        .visible_sessions(&employee("emp-1"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_manager_falls_back_to_all_sessions() {
    let services = Services::in_memory().unwrap();
    let mgr = manager();
    let session = services.sessions.create(&mgr, "Only", &[]).unwrap().session;
    services.sessions.complete(&mgr, &session.id).unwrap();

    let visible = services.sessions.visible_sessions(&mgr).unwrap();
    assert_eq!(visible.len(), 1);
    assert!(visible[0].is_completed());
}

#[test]
fn test_export_rows_follow_shop_items() {
    let services = Services::in_memory().unwrap();
    let mgr = manager();

    let drinks = services
        .catalog
        .create_category(&mgr, CreateCategoryInput { name: "Drinks".into(), sort_order: 1 })
        .unwrap();
    let snacks = services
        .catalog
        .create_category(&mgr, CreateCategoryInput { name: "Snacks".into(), sort_order: 0 })
        .unwrap();

    let mut ids = Vec::new();
    for (name, category) in [
        ("Tonic", Some(drinks.id.clone())),
        ("Crisps", Some(snacks.id.clone())),
        ("Cola", Some(drinks.id.clone())),
        ("Matches", None),
        ("Nuts", Some(snacks.id.clone())),
    ] {
        let item = services
            .catalog
            .create_item(
                &mgr,
                CreateItemInput {
                    name: name.into(),
                    pack_size: None,
                    category_id: category,
                },
            )
            .unwrap();
        ids.push(item.id);
    }

    let shop = services
        .catalog
        .create_shop(&mgr, CreateShopInput { name: "Corner".into() })
        .unwrap();
    // Nuts is not assigned to the shop
    services
        .catalog
        .set_shop_items(&mgr, &shop.id, &ids[..4])
        .unwrap();

    let session = services.sessions.create(&mgr, "Export me", &[]).unwrap().session;
    services
        .counts
        .save_counts(&mgr, &session.id, &shop.id, &[CountEntry::new(&ids[2], 5, 1)])
        .unwrap();

    let workbook = services.export.workbook(&mgr, &session.id).unwrap();
    assert_eq!(workbook.sheets.len(), 1);

    let rows = &workbook.sheets[0].rows;
    let names: Vec<(&str, &str)> = rows
        .iter()
        .map(|r| (r.category.as_str(), r.item_name.as_str()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("Snacks", "Crisps"),
            ("Drinks", "Cola"),
            ("Drinks", "Tonic"),
            (UNCATEGORIZED, "Matches"),
        ]
    );

    let cola = rows.iter().find(|r| r.item_name == "Cola").unwrap();
    assert_eq!((cola.boxes, cola.singles), (5, 1));
    let tonic = rows.iter().find(|r| r.item_name == "Tonic").unwrap();
    assert_eq!((tonic.boxes, tonic.singles), (0, 0));

    let (file_name, bytes) = services.export.archive(&mgr, &session.id).unwrap();
    assert!(file_name.ends_with(".zip"));
    assert!(!bytes.is_empty());
}

#[test]
fn test_import_creates_category_once() {
    let services = Services::in_memory().unwrap();
    let mgr = manager();

    let csv = "Name,Pack Size,Category\nCola,24,\nLemonade,6,Soft Drinks\nTonic,,soft drinks\n";
    let result = services.import.import_csv(&mgr, csv).unwrap();
    assert_eq!(result.imported, 3);
    assert_eq!(result.failed, 0);
    assert_eq!(result.categories_created, 1);

    let categories = services.catalog.list_categories(&mgr).unwrap();
    assert_eq!(categories.len(), 1);

    let items = services.catalog.list_items(&mgr).unwrap();
    let with_category = items.iter().filter(|i| i.category_id.is_some()).count();
    assert_eq!(with_category, 2);
}

#[test]
fn test_import_rows_continue_past_blank_names() {
    let services = Services::in_memory().unwrap();
    let rows = vec![
        ImportRow { name: "Cola".into(), pack_size: None, category: None },
        ImportRow { name: "   ".into(), pack_size: None, category: Some("Drinks".into()) },
        ImportRow { name: "Tonic".into(), pack_size: None, category: None },
    ];

    let result = services.import.import_rows(&manager(), rows).unwrap();
    assert_eq!(result.imported, 2);
    assert_eq!(result.skipped, 1);
    assert_eq!(result.categories_created, 0);
}

#[test]
fn test_tenants_are_isolated() {
    let services = Services::in_memory().unwrap();
    let north = Actor::manager("mgr-n", TenantContext::new("north"));
    let south = Actor::manager("mgr-s", TenantContext::new("south"));

    let session = services.sessions.create(&north, "North count", &[]).unwrap().session;
    services
        .catalog
        .create_shop(&north, CreateShopInput { name: "North shop".into() })
        .unwrap();

    assert!(services.sessions.visible_sessions(&south).unwrap().is_empty());
    assert!(services.counts.visible_shops(&south).unwrap().is_empty());

    let err = services.sessions.get(&south, &session.id).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
    let err = services.sessions.complete(&south, &session.id).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[test]
fn test_items_for_shop_fallback() {
    let services = Services::in_memory().unwrap();
    let mgr = manager();
    let (shop, a, _) = seed_shop(&services, &mgr);
    let bare = services
        .catalog
        .create_shop(&mgr, CreateShopInput { name: "Kiosk".into() })
        .unwrap();

    // No shop-item rows: every item is offered
    assert_eq!(services.counts.items_for_shop(&mgr, &bare.id).unwrap().len(), 2);

    services.catalog.set_shop_items(&mgr, &shop.id, &[a.id.clone()]).unwrap();
    let items = services.counts.items_for_shop(&mgr, &shop.id).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, a.id);

    let err = services.counts.items_for_shop(&employee("emp-9"), &shop.id).unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    let db = Arc::new(LedgerDb::open_in_memory().unwrap());
    let closed = Services::new(
        db,
        AccessConfig {
            unassigned_sessions: UnassignedPolicy::Open,
            unassigned_shop_items: UnassignedPolicy::Closed,
        },
        LimitsConfig::default(),
    );
    seed_shop(&closed, &mgr);
    let kiosk = closed
        .catalog
        .create_shop(&mgr, CreateShopInput { name: "Kiosk".into() })
        .unwrap();
    assert!(closed.counts.items_for_shop(&mgr, &kiosk.id).unwrap().is_empty());
}

#[test]
fn test_save_rejects_items_outside_shop() {
    let services = Services::in_memory().unwrap();
    let mgr = manager();
    let (shop, a, b) = seed_shop(&services, &mgr);
    services.catalog.set_shop_items(&mgr, &shop.id, &[a.id.clone()]).unwrap();
    let session = services.sessions.create(&mgr, "Weekly", &[]).unwrap().session;

    for entries in [
        vec![CountEntry::new("no-such-item", 5, 0)],
        vec![CountEntry::new(&a.id, 1, 0), CountEntry::new(&b.id, 2, 0)],
    ] {
        let err = services
            .counts
            .save_counts(&mgr, &session.id, &shop.id, &entries)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    // The rejected batch wrote nothing, including its eligible entry
    assert!(services
        .counts
        .counts_for_shop(&mgr, &session.id, &shop.id)
        .unwrap()
        .is_empty());

    services
        .counts
        .save_counts(&mgr, &session.id, &shop.id, &[CountEntry::new(&a.id, 1, 0)])
        .unwrap();
    assert_eq!(quantities(&services, &mgr, &session.id, &shop.id, &a.id), Some((1, 0)));
}
