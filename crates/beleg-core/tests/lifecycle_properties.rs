mod common;

use std::{collections::HashSet, sync::Arc, thread};

use beleg_core::{
    BookStore, CoreError, IdAllocator, LedgerStore, LedgerStoreExt, NewRecurring,
    ScheduleService,
};
use beleg_domain::{
    Category, DependentResolution, Frequency, Kind, LifecycleState, RecordPatch,
    RecurringDefinition,
};
use common::{amount, complete, date, Harness};

#[test]
fn concurrent_allocation_never_repeats_an_identifier() {
    let store: Arc<dyn LedgerStore> = Arc::new(BookStore::default());
    let allocator = IdAllocator::new(Arc::clone(&store));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let allocator = allocator.clone();
            thread::spawn(move || {
                (0..25)
                    .map(|_| {
                        allocator
                            .allocate(Kind::Expense, 2025, Some("TB"))
                            .expect("allocate")
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for identifier in handle.join().expect("thread") {
            assert!(seen.insert(identifier.to_string()), "duplicate {identifier}");
        }
    }
    assert_eq!(seen.len(), 200);
    assert_eq!(store.max_sequence(Kind::Expense, Some("TB"), 2025).unwrap(), 200);
}

#[test]
fn concurrent_archival_assigns_distinct_identifiers() {
    let harness = Harness::new(date(2025, 6, 1));
    let business = harness.business("Tech Blog", "TB");
    let mut ids = Vec::new();
    for n in 0..12 {
        let name = format!("scan-{n:02}.pdf");
        let path = harness.drop_scan(&business, Kind::Expense, &name);
        let registration = harness
            .lifecycle
            .register_file(Some(business.id), &path)
            .unwrap();
        harness.lifecycle.extract(registration.record_id).unwrap();
        ids.push(registration.record_id);
    }
    let handles: Vec<_> = ids
        .chunks(3)
        .map(|chunk| {
            let lifecycle = Arc::clone(&harness.lifecycle);
            let chunk = chunk.to_vec();
            thread::spawn(move || {
                for id in chunk {
                    let patch = RecordPatch {
                        date: Some(date(2025, 5, 2)),
                        amount: Some(amount("10")),
                        category: Some(Category::Porto),
                        ..RecordPatch::default()
                    };
                    lifecycle.review(id, &patch).expect("review");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread");
    }

    let identifiers: HashSet<_> = harness
        .store
        .records()
        .unwrap()
        .into_iter()
        .map(|record| record.identifier.expect("archived").to_string())
        .collect();
    assert_eq!(identifiers.len(), 12);
}

#[test]
fn second_generation_pass_is_a_no_op() {
    let harness = Harness::new(date(2025, 5, 15));
    let business = harness.business("Studio", "ST");
    let (_, first) = harness
        .recurring
        .create(NewRecurring {
            business_id: Some(business.id),
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
    assert_eq!(first.created.len(), 5);
    assert_eq!(first.archived.len(), 5);

    let second = harness.recurring.generate_now().unwrap();
    assert!(second.created.is_empty());
    assert!(second.archived.is_empty());
    assert_eq!(harness.store.records().unwrap().len(), 5);
}

fn stored_definition(harness: &Harness, start: chrono::NaiveDate) -> RecurringDefinition {
    let definition = RecurringDefinition::new(
        None,
        Kind::Expense,
        amount("19.99"),
        Category::Telefon,
        "Mobile plan",
        Frequency::Monthly,
        start,
    );
    let stored = definition.clone();
    harness
        .store
        .mutate(move |book| {
            book.definitions.push(definition);
            Ok(())
        })
        .unwrap();
    stored
}

#[test]
fn parallel_generation_creates_one_record_per_occurrence() {
    let harness = Harness::new(date(2025, 5, 15));
    let phone = stored_definition(&harness, date(2025, 1, 1));
    let rent = stored_definition(&harness, date(2025, 1, 10));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let recurring = Arc::clone(&harness.recurring);
            thread::spawn(move || recurring.generate_now().expect("generate"))
        })
        .collect();
    let created: usize = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread").created.len())
        .sum();

    let records = harness.store.records().unwrap();
    assert_eq!(created, 10);
    assert_eq!(records.len(), 10);
    let occurrences: HashSet<_> = records
        .iter()
        .map(|record| (record.recurring_id, record.date))
        .collect();
    assert_eq!(occurrences.len(), 10);
    for definition in [&phone, &rent] {
        assert_eq!(
            records
                .iter()
                .filter(|record| record.recurring_id == Some(definition.id))
                .count(),
            5
        );
    }
    let identifiers: HashSet<_> = records
        .iter()
        .map(|record| record.identifier.clone().expect("archived").to_string())
        .collect();
    assert_eq!(identifiers.len(), 10);
}

#[test]
fn generation_from_a_stale_list_after_delete_adds_nothing() {
    let harness = Harness::new(date(2025, 3, 10));
    let (definition, summary) = harness
        .recurring
        .create(NewRecurring {
            business_id: None,
            kind: Kind::Expense,
            amount: amount("19.99"),
            category: Category::Telefon,
            description: "Mobile plan".into(),
            frequency: Frequency::Monthly,
            day_of_month: Some(10),
            start_date: date(2025, 1, 10),
            end_date: None,
        })
        .unwrap();
    assert_eq!(summary.archived.len(), 3);
    let mut stale = definition.clone();
    stale.last_generated = Some(date(2025, 2, 1));

    harness.recurring.delete(definition.id).unwrap();
    let schedule = ScheduleService::new(Arc::clone(&harness.store));
    let created = schedule.generate_due(&[stale], date(2025, 4, 2));
    let archived = harness.lifecycle.materialize_placeholders().unwrap();

    assert!(created.is_empty());
    assert!(archived.is_empty());
    let records = harness.store.records().unwrap();
    assert_eq!(records.len(), 3);
    assert!(records
        .iter()
        .all(|record| record.identifier.is_some() && record.recurring_id.is_none()));
}

#[test]
fn generation_racing_a_delete_leaves_only_numbered_records() {
    let harness = Harness::new(date(2025, 5, 15));
    let definition = stored_definition(&harness, date(2015, 1, 1));
    let recurring = Arc::clone(&harness.recurring);
    let generator = thread::spawn(move || recurring.generate_now().expect("generate"));
    thread::yield_now();

    harness.recurring.delete(definition.id).unwrap();
    generator.join().expect("thread");
    let again = harness.recurring.generate_now().unwrap();

    assert!(again.created.is_empty());
    let records = harness.store.records().unwrap();
    assert!(records.iter().all(|record| record.state() == LifecycleState::Archived
        && record.identifier.is_some()
        && record.recurring_id.is_none()));
    let dates: HashSet<_> = records.iter().map(|record| record.date).collect();
    assert_eq!(dates.len(), records.len());
}

#[test]
fn day_31_lands_on_last_day_of_february() {
    let harness = Harness::new(date(2025, 3, 1));
    let (definition, summary) = harness
        .recurring
        .create(NewRecurring {
            business_id: None,
            kind: Kind::Expense,
            amount: amount("49.90"),
            category: Category::Versicherung,
            description: "Liability insurance".into(),
            frequency: Frequency::Monthly,
            day_of_month: Some(31),
            start_date: date(2025, 1, 1),
            end_date: None,
        })
        .unwrap();
    assert_eq!(summary.created.len(), 2);
    let mut dates: Vec<_> = harness
        .store
        .records()
        .unwrap()
        .iter()
        .filter_map(|record| record.date)
        .collect();
    dates.sort();
    assert_eq!(dates, vec![date(2025, 1, 31), date(2025, 2, 28)]);
    assert_eq!(definition.last_generated, Some(date(2025, 2, 28)));
}

#[test]
fn end_date_caps_occurrences_at_three() {
    let harness = Harness::new(date(2025, 12, 31));
    let (_, summary) = harness
        .recurring
        .create(NewRecurring {
            business_id: None,
            kind: Kind::Income,
            amount: amount("300"),
            category: Category::Stipendien,
            description: "Grant".into(),
            frequency: Frequency::Monthly,
            day_of_month: None,
            start_date: date(2025, 1, 1),
            end_date: Some(date(2025, 3, 31)),
        })
        .unwrap();
    assert_eq!(summary.created.len(), 3);
    assert!(harness.recurring.generate_now().unwrap().created.is_empty());
    assert_eq!(harness.store.records().unwrap().len(), 3);
}

#[test]
fn archived_scan_gets_canonical_filename() {
    let harness = Harness::new(date(2025, 11, 10));
    let business = harness.business("Tech Blog", "TB");
    let path = harness.drop_scan(&business, Kind::Expense, "IMG_0042.pdf");
    harness.extractor.script(
        "IMG_0042.pdf",
        Ok(complete(date(2025, 11, 8), "1299.5", Category::Buero, "Laptop HP ProBook")),
    );

    let registration = harness
        .lifecycle
        .register_file(Some(business.id), &path)
        .unwrap();
    let state = harness.lifecycle.extract(registration.record_id).unwrap();
    assert_eq!(state, LifecycleState::Archived);

    let record = harness.lifecycle.get(registration.record_id).unwrap();
    let expected = harness
        .layout
        .archive_dir(Some(&business), Kind::Expense, 2025)
        .join("251108_ARE-TB-2025001_Büro_Laptop_HP_ProBook_1299_50.pdf");
    assert_eq!(record.artifact.as_deref(), Some(expected.as_path()));
    assert!(expected.is_file());
    assert!(!path.exists());
    assert!(record.reviewed && record.archived && !record.placeholder);
}

#[test]
fn missing_category_blocks_auto_archive() {
    let harness = Harness::new(date(2025, 4, 1));
    let business = harness.business("Tech Blog", "TB");
    let path = harness.drop_scan(&business, Kind::Expense, "receipt.pdf");
    let mut extraction = complete(date(2025, 3, 30), "12.40", Category::Porto, "Stamps");
    extraction.category = None;
    harness.extractor.script("receipt.pdf", Ok(extraction));

    let registration = harness
        .lifecycle
        .register_file(Some(business.id), &path)
        .unwrap();
    let state = harness.lifecycle.extract(registration.record_id).unwrap();

    assert_eq!(state, LifecycleState::Extracted);
    let record = harness.lifecycle.get(registration.record_id).unwrap();
    assert!(record.identifier.is_none());
    assert!(!record.archived);
    assert_eq!(record.missing_fields(), vec!["category"]);
    assert!(path.exists());
}

#[test]
fn deleting_business_with_records_requires_a_choice() {
    let harness = Harness::new(date(2025, 4, 1));
    let business = harness.business("Tech Blog", "TB");
    let path = harness.drop_scan(&business, Kind::Expense, "receipt.pdf");
    harness
        .lifecycle
        .register_file(Some(business.id), &path)
        .unwrap();
    let before = harness.store.snapshot().unwrap();

    let err = harness
        .businesses
        .delete(business.id, DependentResolution::Block)
        .expect_err("dependents block deletion");
    match &err {
        CoreError::BusinessHasDependents {
            records,
            definitions,
            ..
        } => {
            assert_eq!((*records, *definitions), (1, 0));
        }
        other => panic!("unexpected error: {other}"),
    }
    let message = err.to_string();
    assert!(message.contains("cascade") && message.contains("reassign"));
    assert_eq!(harness.store.snapshot().unwrap(), before);
    assert!(harness.layout.inbox_dir(Some(&business), Kind::Expense).is_dir());
}

#[test]
fn editing_archived_record_keeps_identifier() {
    let harness = Harness::new(date(2025, 11, 10));
    let business = harness.business("Tech Blog", "TB");
    let path = harness.drop_scan(&business, Kind::Expense, "laptop.pdf");
    harness.extractor.script(
        "laptop.pdf",
        Ok(complete(date(2025, 11, 8), "1299.5", Category::Buero, "Laptop HP ProBook")),
    );
    let registration = harness
        .lifecycle
        .register_file(Some(business.id), &path)
        .unwrap();
    harness.lifecycle.extract(registration.record_id).unwrap();
    let before = harness.lifecycle.get(registration.record_id).unwrap();
    let extraction_calls = harness.extractor.calls();

    let patch = RecordPatch {
        amount: Some(amount("1350")),
        category: Some(Category::Fortbildung),
        ..RecordPatch::default()
    };
    let after = harness
        .lifecycle
        .update_fields(registration.record_id, &patch)
        .unwrap();

    assert_eq!(after.identifier, before.identifier);
    assert_eq!(after.identifier.unwrap().to_string(), "ARE-TB-2025001");
    let old_path = before.artifact.unwrap();
    let new_path = after.artifact.unwrap();
    assert_ne!(old_path, new_path);
    assert_eq!(
        new_path.file_name().and_then(|n| n.to_str()),
        Some("251108_ARE-TB-2025001_Fortbildung_Laptop_HP_ProBook_1350_00.pdf")
    );
    assert!(new_path.is_file());
    assert!(!old_path.exists());
    assert_eq!(harness.extractor.calls(), extraction_calls);
}
