mod common;

use predicates::prelude::*;
use predicates::str::contains;

use common::{drop_scan, Workspace};

#[test]
fn business_add_then_list() {
    let ws = Workspace::new();

    ws.beleg(&["business", "add", "Tech Blog", "TB"])
        .assert()
        .success()
        .stdout(contains("created Tech Blog [TB]"));

    ws.beleg(&["business", "list"])
        .assert()
        .success()
        .stdout(contains("Tech Blog").and(contains("0 record(s)")));
    assert!(ws.inbox.join("Tech Blog").join("Ausgaben").is_dir());
    assert!(ws.ledger_json().contains("\"TB\""));
}

#[test]
fn manual_entry_is_archived_with_placeholder() {
    let ws = Workspace::new();
    ws.beleg(&["business", "add", "Tech Blog", "TB"]).assert().success();

    ws.beleg(&[
        "add", "--kind", "expense", "--date", "2025-03-12", "--amount", "19.99",
        "--category", "Telefon", "--description", "Mobile plan", "--business", "TB",
    ])
    .assert()
    .success()
    .stdout(contains("archived as ARE-TB-2025001"));

    let placeholder = ws
        .archive
        .join("Tech Blog")
        .join("Ausgaben")
        .join("2025")
        .join("250312_ARE-TB-2025001_Telefon_Mobile_plan_19_99.txt");
    assert!(placeholder.is_file());

    ws.beleg(&["show", "ARE-TB-2025001"])
        .assert()
        .success()
        .stdout(contains("Mobile plan").and(contains("Archived")));
}

#[test]
fn scan_archives_complete_documents() {
    let ws = Workspace::new();
    ws.beleg(&["business", "add", "Tech Blog", "TB"]).assert().success();
    drop_scan(
        &ws.inbox.join("Tech Blog").join("Einnahmen"),
        "invoice.pdf",
        r#"{ "date": "2025-06-02", "amount": "450.00", "category": "Honorar",
             "description": "Workshop fee" }"#,
    );

    ws.beleg(&["scan"])
        .assert()
        .success()
        .stdout(contains("1 new file(s), 1 archived"));
    let inbox = ws.inbox.join("Tech Blog").join("Einnahmen");
    assert!(!inbox.join("invoice.pdf").exists());
    assert!(!inbox.join("invoice.pdf.json").exists());

    ws.beleg(&["list", "--kind", "income"])
        .assert()
        .success()
        .stdout(contains("ERE-TB-2025001"));
    ws.beleg(&["summary", "--business", "TB", "--year", "2025"])
        .assert()
        .success()
        .stdout(contains("income").and(contains("450.00")));
}

#[test]
fn incomplete_scan_is_reviewed_by_short_id() {
    let ws = Workspace::new();
    ws.beleg(&["business", "add", "Tech Blog", "TB"]).assert().success();
    drop_scan(
        &ws.inbox.join("Tech Blog").join("Einnahmen"),
        "invoice.pdf",
        r#"{ "date": "2025-06-02", "amount": "450.00", "description": "Workshop fee" }"#,
    );

    ws.beleg(&["scan"])
        .assert()
        .success()
        .stdout(contains("1 awaiting review"));

    let listing = ws.beleg(&["list", "--state", "extracted"]).output().unwrap();
    let stdout = String::from_utf8(listing.stdout).unwrap();
    let short_id = stdout
        .split_whitespace()
        .next()
        .expect("one listed record")
        .to_string();

    ws.beleg(&["review", &short_id, "--category", "Honorar"])
        .assert()
        .success()
        .stdout(contains("archived as ERE-TB-2025001"));
}

#[test]
fn unknown_business_is_a_usage_error() {
    let ws = Workspace::new();

    ws.beleg(&["list", "--business", "XX"])
        .assert()
        .failure()
        .stderr(contains("unknown business `XX`"));
}

#[test]
fn business_with_records_needs_a_resolution() {
    let ws = Workspace::new();
    ws.beleg(&["business", "add", "Tech Blog", "TB"]).assert().success();
    ws.beleg(&[
        "add", "--kind", "income", "--date", "2025-05-01", "--amount", "800",
        "--category", "Honorar", "--description", "Talk", "--business", "TB",
    ])
    .assert()
    .success();

    ws.beleg(&["business", "remove", "TB"])
        .assert()
        .failure()
        .stderr(contains("cascade"));

    ws.beleg(&["business", "remove", "TB", "--cascade"])
        .assert()
        .success()
        .stdout(contains("1 record(s)"));
    assert!(!ws.ledger_json().contains("Talk"));
}

#[test]
fn recurring_booking_is_listed() {
    let ws = Workspace::new();
    ws.beleg(&["business", "add", "Tech Blog", "TB"]).assert().success();

    ws.beleg(&[
        "recurring", "add", "--kind", "expense", "--amount", "19.99", "--category", "Telefon",
        "--description", "Phone", "--day", "15", "--start", "2025-01-15", "--business", "TB",
    ])
    .assert()
    .success()
    .stdout(contains("occurrence(s) archived"));

    ws.beleg(&["recurring", "list", "--business", "TB"])
        .assert()
        .success()
        .stdout(contains("Phone").and(contains("monthly")));
    ws.beleg(&["list", "--search", "ARE-TB-2025001"])
        .assert()
        .success()
        .stdout(contains("Phone"));
}

#[test]
fn fresh_archive_has_no_stale_artifacts() {
    let ws = Workspace::new();

    ws.beleg(&["stale"])
        .assert()
        .success()
        .stdout(contains("every archived record has its artifact in place"));
}
