//! Wires configuration, persistence and the core services into one handle.

use std::sync::Arc;

use beleg_config::{Config, ConfigManager};
use beleg_core::{
    ArchiveLayout, BusinessService, Clock, Dashboard, Extractor, IdAllocator, LedgerStore,
    LedgerStoreExt, LifecycleService, PlaceholderRenderer, RecurringService, ScheduleService,
    SummaryService, SystemClock, Watcher,
};
use beleg_storage_json::JsonLedgerFile;
use tracing::info;
use uuid::Uuid;

use crate::{AppError, SidecarJsonExtractor, TextPlaceholderRenderer};

/// The running engine: one ledger, one folder layout and the services operating on them.
pub struct Beleg {
    config: Config,
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    lifecycle: Arc<LifecycleService>,
    businesses: BusinessService,
    recurring: Arc<RecurringService>,
    watcher: Watcher,
}

impl Beleg {
    /// Opens the ledger configured under `manager` with the built-in collaborators.
    pub fn open(manager: &ConfigManager) -> Result<Self, AppError> {
        Self::open_with(manager, manager.load()?)
    }

    /// Like [`open`](Self::open) with an already loaded, possibly adjusted config.
    pub fn open_with(manager: &ConfigManager, config: Config) -> Result<Self, AppError> {
        config.validate()?;
        let ledger = JsonLedgerFile::new(manager.ledger_path(&config))
            .with_backups(manager.backups_dir(), config.ledger_backup_retention);
        let store: Arc<dyn LedgerStore> = Arc::new(ledger.open_store()?);
        info!(
            inbox = %config.resolve_inbox_root().display(),
            archive = %config.resolve_archive_root().display(),
            "beleg opened"
        );
        Ok(Self::assemble(
            config,
            store,
            Arc::new(SidecarJsonExtractor),
            Arc::new(TextPlaceholderRenderer),
            Arc::new(SystemClock),
        ))
    }

    /// Builds the service graph from explicit parts.
    pub fn assemble(
        config: Config,
        store: Arc<dyn LedgerStore>,
        extractor: Arc<dyn Extractor>,
        renderer: Arc<dyn PlaceholderRenderer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let layout = ArchiveLayout::new(config.resolve_inbox_root(), config.resolve_archive_root())
            .with_extensions(config.accepted_extensions.iter().map(String::as_str));
        let allocator =
            IdAllocator::with_retry_limit(Arc::clone(&store), config.allocation_retry_limit);
        let lifecycle = Arc::new(LifecycleService::new(
            Arc::clone(&store),
            allocator,
            extractor,
            renderer,
            layout.clone(),
        ));
        let businesses = BusinessService::new(Arc::clone(&store), layout, Arc::clone(&clock));
        let schedule =
            ScheduleService::with_iteration_cap(Arc::clone(&store), config.recurring_iteration_cap);
        let recurring = Arc::new(RecurringService::new(
            Arc::clone(&store),
            schedule,
            Arc::clone(&lifecycle),
            Arc::clone(&clock),
        ));
        let watcher = Watcher::new(
            Arc::clone(&store),
            Arc::clone(&lifecycle),
            config
                .generate_recurring_on_tick
                .then(|| Arc::clone(&recurring)),
            config.watch_interval(),
        );
        Self {
            config,
            store,
            clock,
            lifecycle,
            businesses,
            recurring,
            watcher,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn lifecycle(&self) -> &LifecycleService {
        &self.lifecycle
    }

    pub fn businesses(&self) -> &BusinessService {
        &self.businesses
    }

    pub fn recurring(&self) -> &RecurringService {
        &self.recurring
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }

    /// Dashboard figures for `year`, optionally narrowed to one business.
    pub fn dashboard(&self, business_id: Option<Uuid>, year: i32) -> Result<Dashboard, AppError> {
        let today = self.clock.today();
        Ok(self
            .store
            .query(|book| SummaryService::dashboard(book, business_id, year, today))?)
    }
}
