mod common;

use std::{
    fs,
    thread,
    time::{Duration, Instant},
};

use beleg_core::{LedgerStoreExt, NewRecurring};
use beleg_domain::{BusinessPatch, Category, Frequency, Kind, LifecycleState, RecordPatch};
use common::{amount, complete, date, notes_path, Harness};

#[test]
fn scan_once_archives_complete_and_parks_incomplete_files() {
    let harness = Harness::new(date(2025, 11, 10));
    let blog = harness.business("Tech Blog", "TB");
    let podcast = harness.business("Podcast", "PC");
    harness.drop_scan(&blog, Kind::Expense, "laptop.pdf");
    harness.drop_scan(&podcast, Kind::Income, "sponsor.pdf");
    harness.drop_scan(&blog, Kind::Expense, "notes.txt");
    harness.extractor.script(
        "laptop.pdf",
        Ok(complete(date(2025, 11, 8), "1299.5", Category::Buero, "Laptop")),
    );

    let watcher = harness.watcher(Duration::from_secs(60));
    let report = watcher.scan_once();

    assert_eq!(report.discovered, 2);
    assert_eq!(report.extracted, 2);
    assert_eq!(report.archived, 1);
    assert_eq!(report.awaiting_review, 1);
    assert_eq!(report.failed_files, 0);
    assert!(!report.interrupted);

    let again = watcher.scan_once();
    assert_eq!(again.discovered, 0);
    assert_eq!(again.extracted, 0);
    assert_eq!(harness.store.records().unwrap().len(), 2);
}

#[test]
fn failed_extraction_is_retried_on_the_next_pass() {
    let harness = Harness::new(date(2025, 4, 1));
    let blog = harness.business("Tech Blog", "TB");
    harness.drop_scan(&blog, Kind::Expense, "receipt.pdf");
    harness
        .extractor
        .script("receipt.pdf", Err("timeout".into()));
    let watcher = harness.watcher(Duration::from_secs(60));

    let first = watcher.scan_once();
    assert_eq!((first.discovered, first.failed_files), (1, 1));

    harness.extractor.script(
        "receipt.pdf",
        Ok(complete(date(2025, 3, 30), "12.40", Category::Porto, "Stamps")),
    );
    let second = watcher.scan_once();

    assert_eq!(second.discovered, 0);
    assert_eq!(second.archived, 1);
    let records = harness.store.records().unwrap();
    assert_eq!(records[0].state(), LifecycleState::Archived);
}

#[test]
fn missing_business_folder_does_not_stop_the_pass() {
    let harness = Harness::new(date(2025, 4, 1));
    let gone = harness.business("Archive Co", "AC");
    let blog = harness.business("Tech Blog", "TB");
    fs::remove_dir_all(harness.layout.inbox_root().join("Archive Co")).unwrap();
    harness.drop_scan(&blog, Kind::Expense, "receipt.pdf");

    let report = harness.watcher(Duration::from_secs(60)).scan_once();

    assert_eq!(report.discovered, 1);
    assert_eq!(report.failed_businesses, 0);
    assert!(!harness.layout.inbox_dir(Some(&gone), Kind::Expense).exists());
}

#[test]
fn scan_runs_recurring_generation() {
    let harness = Harness::new(date(2025, 2, 10));
    harness
        .recurring
        .create(NewRecurring {
            business_id: None,
            kind: Kind::Expense,
            amount: amount("950"),
            category: Category::Raum,
            description: "Office rent".into(),
            frequency: Frequency::Monthly,
            day_of_month: Some(1),
            start_date: date(2025, 1, 1),
            end_date: None,
        })
        .unwrap();

    let report = harness.watcher(Duration::from_secs(60)).scan_once();

    assert_eq!(report.generated, 0);
    assert_eq!(harness.store.records().unwrap().len(), 2);
}

#[test]
fn start_and_stop_control_the_background_thread() {
    let harness = Harness::new(date(2025, 4, 1));
    let blog = harness.business("Tech Blog", "TB");
    harness.drop_scan(&blog, Kind::Expense, "receipt.pdf");
    let watcher = harness.watcher(Duration::from_millis(50));

    assert!(watcher.start().unwrap());
    assert!(!watcher.start().unwrap());
    assert!(watcher.is_running());

    let deadline = Instant::now() + Duration::from_secs(5);
    while harness.store.records().unwrap().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(harness.store.records().unwrap().len(), 1);

    assert!(watcher.stop().unwrap());
    assert!(!watcher.is_running());
    assert!(!watcher.stop().unwrap());

    harness.drop_scan(&blog, Kind::Expense, "later.pdf");
    thread::sleep(Duration::from_millis(150));
    assert_eq!(harness.store.records().unwrap().len(), 1);
}

#[test]
fn stop_interrupts_a_long_interval() {
    let harness = Harness::new(date(2025, 4, 1));
    let watcher = harness.watcher(Duration::from_secs(3600));
    watcher.start().unwrap();
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    watcher.stop().unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn renamed_business_inbox_is_still_scanned() {
    let harness = Harness::new(date(2025, 11, 10));
    let blog = harness.business("Tech Blog", "TB");
    harness.extractor.script(
        "archived.pdf",
        Ok(complete(date(2025, 11, 3), "40", Category::Porto, "Stamps")),
    );
    harness.drop_scan(&blog, Kind::Expense, "archived.pdf");
    let watcher = harness.watcher(Duration::from_secs(60));
    assert_eq!(watcher.scan_once().archived, 1);

    let waiting = harness.drop_scan(&blog, Kind::Expense, "scan.pdf");
    harness
        .businesses
        .update(
            blog.id,
            &BusinessPatch {
                name: Some("Tech Journal".into()),
                ..BusinessPatch::default()
            },
        )
        .unwrap();

    let report = watcher.scan_once();

    assert_eq!(report.discovered, 1);
    assert_eq!(report.awaiting_review, 1);
    let records = harness.store.records().unwrap();
    assert!(records
        .iter()
        .any(|record| record.artifact.as_deref() == Some(waiting.as_path())));
    assert!(harness.lifecycle.stale_artifacts().unwrap().is_empty());
}

#[test]
fn companion_files_leave_the_inbox_with_their_scan() {
    let harness = Harness::new(date(2025, 6, 10));
    let blog = harness.business("Tech Blog", "TB");
    let invoice = harness.drop_scan(&blog, Kind::Income, "invoice.pdf");
    let receipt = harness.drop_scan(&blog, Kind::Expense, "receipt.pdf");
    fs::write(notes_path(&invoice), "{}").unwrap();
    fs::write(notes_path(&receipt), "{}").unwrap();
    harness.extractor.script(
        "invoice.pdf",
        Ok(complete(date(2025, 6, 2), "450", Category::Honorar, "Workshop fee")),
    );

    let report = harness.watcher(Duration::from_secs(60)).scan_once();

    assert_eq!((report.archived, report.awaiting_review), (1, 1));
    assert!(!invoice.exists());
    assert!(!notes_path(&invoice).exists());
    assert!(notes_path(&receipt).exists());

    let parked = harness
        .store
        .records()
        .unwrap()
        .into_iter()
        .find(|record| !record.archived)
        .expect("parked record");
    let fields = RecordPatch {
        date: Some(date(2025, 6, 4)),
        amount: Some(amount("12.40")),
        category: Some(Category::Porto),
        description: Some("Stamps".into()),
        ..RecordPatch::default()
    };
    harness.lifecycle.review(parked.id, &fields).unwrap();

    assert!(!receipt.exists());
    assert!(!notes_path(&receipt).exists());
}
