mod common;

use std::sync::Arc;

use beleg::{Beleg, SidecarJsonExtractor, TextPlaceholderRenderer};
use beleg_config::Config;
use beleg_core::{BookStore, FixedClock, LedgerStore, ManualEntry};
use beleg_domain::{Category, Kind, LedgerBook, LifecycleState, RecordFilter};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::tempdir;

use common::{drop_scan, Workspace};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn assembled_engine_files_scans_and_reports_totals() {
    let dir = tempdir().unwrap();
    let config = Config {
        inbox_root: Some(dir.path().join("Inbox")),
        archive_root: Some(dir.path().join("Archive")),
        ..Config::default()
    };
    let store: Arc<dyn LedgerStore> = Arc::new(BookStore::in_memory(LedgerBook::new()));
    let app = Beleg::assemble(
        config,
        store,
        Arc::new(SidecarJsonExtractor),
        Arc::new(TextPlaceholderRenderer),
        Arc::new(FixedClock::on(date(2025, 11, 20))),
    );
    let business = app.businesses().create("Tech Blog", "tb", None).unwrap();
    assert_eq!(business.prefix, "TB");

    drop_scan(
        &dir.path().join("Inbox").join("Tech Blog").join("Ausgaben"),
        "IMG_01.pdf",
        r#"{ "date": "2025-11-08", "amount": "1299.50", "category": "Büro",
             "description": "Laptop HP ProBook" }"#,
    );
    let report = app.watcher().scan_once();
    assert_eq!(report.discovered, 1);
    assert_eq!(report.archived, 1);

    app.lifecycle()
        .create_manual(ManualEntry {
            business_id: Some(business.id),
            kind: Kind::Income,
            date: date(2025, 11, 2),
            amount: Decimal::new(2000, 0),
            category: Category::Honorar,
            description: "Workshop".into(),
        })
        .unwrap();

    let archived = app
        .lifecycle()
        .list(&RecordFilter {
            state: Some(LifecycleState::Archived),
            ..RecordFilter::default()
        })
        .unwrap();
    assert_eq!(archived.len(), 2);
    let laptop = archived
        .iter()
        .find(|record| record.category == Some(Category::Buero))
        .unwrap();
    assert_eq!(laptop.identifier.as_ref().unwrap().to_string(), "ARE-TB-2025001");
    assert!(laptop
        .artifact
        .as_ref()
        .unwrap()
        .ends_with("Archive/Tech Blog/Ausgaben/2025/251108_ARE-TB-2025001_Büro_Laptop_HP_ProBook_1299_50.pdf"));

    let dashboard = app.dashboard(Some(business.id), 2025).unwrap();
    assert_eq!(dashboard.year_totals.income, Decimal::new(2000, 0));
    assert_eq!(dashboard.year_totals.expenses, Decimal::new(129950, 2));
    assert_eq!(dashboard.month_totals.profit(), Decimal::new(70050, 2));
    assert_eq!(dashboard.pending_reviews, 0);
}

#[test]
fn open_persists_the_ledger_between_sessions() {
    let ws = Workspace::new();

    {
        let app = Beleg::open(&ws.manager()).unwrap();
        app.businesses().create("Photo Club", "PC", Some("#ff8800")).unwrap();
    }

    let app = Beleg::open(&ws.manager()).unwrap();
    let businesses = app.businesses().list().unwrap();
    assert_eq!(businesses.len(), 1);
    assert_eq!(businesses[0].color, "#ff8800");
    assert_eq!(app.config().inbox_root.as_deref(), Some(ws.inbox.as_path()));
    assert!(ws.ledger_json().contains("Photo Club"));
}

#[test]
fn watch_interval_override_is_validated() {
    let ws = Workspace::new();
    let manager = ws.manager();
    let mut config = manager.load().unwrap();
    config.watch_interval_secs = 0;

    let result = Beleg::open_with(&manager, config);

    assert!(matches!(result, Err(beleg::AppError::Config(_))));
}
