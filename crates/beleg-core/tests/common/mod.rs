#![allow(dead_code)]

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use beleg_core::{
    ArchiveLayout, BookStore, BusinessService, Clock, CoreError, Extraction, Extractor,
    FixedClock, IdAllocator, LedgerStore, LifecycleService, PlaceholderRenderer,
    PlaceholderRequest, RecurringService, ScheduleService, Watcher,
};
use beleg_domain::{Business, Category, Kind};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::{tempdir, TempDir};

/// Extraction results keyed by file name. Unknown files yield an empty extraction.
#[derive(Default)]
pub struct ScriptedExtractor {
    results: Mutex<HashMap<String, Result<Extraction, String>>>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn script(&self, file_name: &str, result: Result<Extraction, String>) {
        self.results
            .lock()
            .unwrap()
            .insert(file_name.to_string(), result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Extractor for ScriptedExtractor {
    fn extract(&self, artifact: &Path) -> Result<Extraction, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = artifact
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        match self.results.lock().unwrap().get(name) {
            Some(Ok(extraction)) => Ok(extraction.clone()),
            Some(Err(message)) => Err(CoreError::Collaborator(message.clone())),
            None => Ok(Extraction::default()),
        }
    }

    fn companions(&self, artifact: &Path) -> Vec<PathBuf> {
        vec![notes_path(artifact)]
    }
}

/// The companion file [`ScriptedExtractor`] claims for a scan: `<scan>.notes`.
pub fn notes_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_owned();
    name.push(".notes");
    PathBuf::from(name)
}

#[derive(Default)]
pub struct StubRenderer {
    pub fail: AtomicBool,
    pub renders: AtomicUsize,
}

impl PlaceholderRenderer for StubRenderer {
    fn render_placeholder(&self, request: PlaceholderRequest<'_>) -> Result<Vec<u8>, CoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::Collaborator("renderer offline".into()));
        }
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(format!("placeholder {}", request.identifier).into_bytes())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<dyn LedgerStore>,
    pub layout: ArchiveLayout,
    pub clock: Arc<dyn Clock>,
    pub extractor: Arc<ScriptedExtractor>,
    pub renderer: Arc<StubRenderer>,
    pub lifecycle: Arc<LifecycleService>,
    pub businesses: BusinessService,
    pub recurring: Arc<RecurringService>,
}

impl Harness {
    pub fn new(today: NaiveDate) -> Self {
        let dir = tempdir().expect("tempdir");
        let store: Arc<dyn LedgerStore> = Arc::new(BookStore::default());
        let layout = ArchiveLayout::new(dir.path().join("inbox"), dir.path().join("archive"));
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(today));
        let extractor = Arc::new(ScriptedExtractor::default());
        let renderer = Arc::new(StubRenderer::default());
        let lifecycle = Arc::new(LifecycleService::new(
            Arc::clone(&store),
            IdAllocator::new(Arc::clone(&store)),
            extractor.clone(),
            renderer.clone(),
            layout.clone(),
        ));
        let businesses =
            BusinessService::new(Arc::clone(&store), layout.clone(), Arc::clone(&clock));
        let recurring = Arc::new(RecurringService::new(
            Arc::clone(&store),
            ScheduleService::new(Arc::clone(&store)),
            Arc::clone(&lifecycle),
            Arc::clone(&clock),
        ));
        Self {
            dir,
            store,
            layout,
            clock,
            extractor,
            renderer,
            lifecycle,
            businesses,
            recurring,
        }
    }

    pub fn business(&self, name: &str, prefix: &str) -> Business {
        self.businesses
            .create(name, prefix, None)
            .expect("create business")
    }

    /// Drops a file into the business inbox for `kind`.
    pub fn drop_scan(&self, business: &Business, kind: Kind, name: &str) -> PathBuf {
        let dir = self.layout.inbox_dir(Some(business), kind);
        fs::create_dir_all(&dir).expect("inbox dir");
        let path = dir.join(name);
        fs::write(&path, b"%PDF-1.4 scan").expect("write scan");
        path
    }

    pub fn watcher(&self, interval: Duration) -> Watcher {
        Watcher::new(
            Arc::clone(&self.store),
            Arc::clone(&self.lifecycle),
            Some(Arc::clone(&self.recurring)),
            interval,
        )
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn amount(value: &str) -> Decimal {
    value.parse().unwrap()
}

pub fn complete(on: NaiveDate, value: &str, category: Category, description: &str) -> Extraction {
    Extraction {
        date: Some(on),
        amount: Some(amount(value)),
        category: Some(category),
        description: Some(description.to_string()),
        raw_text: format!("{description} {value}"),
    }
}
