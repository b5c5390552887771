//! Periodic inbox scanning on a background thread.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use beleg_domain::{Business, Kind, LifecycleState};
use tracing::{debug, error, info, warn};

use crate::{storage::LedgerStoreExt, CoreError, LedgerStore, LifecycleService, RecurringService};

pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(10);

/// Counters for one scan pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub discovered: usize,
    pub extracted: usize,
    pub archived: usize,
    pub awaiting_review: usize,
    pub failed_files: usize,
    pub failed_businesses: usize,
    pub generated: usize,
    /// The pass stopped early because the watcher was asked to stop.
    pub interrupted: bool,
}

struct ScanContext {
    store: Arc<dyn LedgerStore>,
    lifecycle: Arc<LifecycleService>,
    recurring: Option<Arc<RecurringService>>,
    running: Arc<AtomicBool>,
}

struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Rescans every business inbox on a fixed interval.
///
/// `stop` flips the shared running flag, wakes the sleeping thread and joins it. A pass in
/// progress finishes the file it is working on and then returns, so no record is left
/// between two committed states.
pub struct Watcher {
    context: Arc<ScanContext>,
    interval: Duration,
    worker: Mutex<Option<Worker>>,
}

impl Watcher {
    /// `recurring`, when given, runs recurring generation after every pass.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        lifecycle: Arc<LifecycleService>,
        recurring: Option<Arc<RecurringService>>,
        interval: Duration,
    ) -> Self {
        Self {
            context: Arc::new(ScanContext {
                store,
                lifecycle,
                recurring,
                running: Arc::new(AtomicBool::new(false)),
            }),
            interval,
            worker: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.context.running.load(Ordering::Acquire)
    }

    /// Starts the background thread. Returns `false` when it is already running.
    pub fn start(&self) -> Result<bool, CoreError> {
        let mut worker = self.lock_worker()?;
        if worker.is_some() {
            return Ok(false);
        }
        let (stop, wake) = mpsc::channel::<()>();
        let context = Arc::clone(&self.context);
        let interval = self.interval;
        context.running.store(true, Ordering::Release);
        let spawned = thread::Builder::new()
            .name("beleg-watcher".into())
            .spawn(move || {
                info!(interval_secs = interval.as_secs(), "watcher started");
                while context.running.load(Ordering::Acquire) {
                    let report = context.scan();
                    debug!(?report, "watcher pass finished");
                    if !context.running.load(Ordering::Acquire) {
                        break;
                    }
                    match wake.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("watcher stopped");
            });
        match spawned {
            Ok(handle) => {
                *worker = Some(Worker { stop, handle });
                Ok(true)
            }
            Err(err) => {
                self.context.running.store(false, Ordering::Release);
                Err(CoreError::Io(err))
            }
        }
    }

    /// Signals the thread and waits for the in-flight file to finish. Returns `false` when
    /// the watcher was not running.
    pub fn stop(&self) -> Result<bool, CoreError> {
        let worker = self.lock_worker()?.take();
        let Some(worker) = worker else {
            return Ok(false);
        };
        self.context.running.store(false, Ordering::Release);
        let _ = worker.stop.send(());
        if worker.handle.join().is_err() {
            error!("watcher thread panicked");
        }
        Ok(true)
    }

    /// Runs a single pass on the calling thread.
    pub fn scan_once(&self) -> ScanReport {
        self.context.scan_all()
    }

    fn lock_worker(&self) -> Result<std::sync::MutexGuard<'_, Option<Worker>>, CoreError> {
        self.worker
            .lock()
            .map_err(|_| CoreError::Storage("watcher state poisoned".into()))
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(error = %err, "watcher not stopped cleanly");
        }
    }
}

impl ScanContext {
    /// Background pass: honours the running flag between files.
    fn scan(&self) -> ScanReport {
        self.scan_with(&|| self.running.load(Ordering::Acquire))
    }

    fn scan_all(&self) -> ScanReport {
        self.scan_with(&|| true)
    }

    fn scan_with(&self, keep_going: &dyn Fn() -> bool) -> ScanReport {
        let mut report = ScanReport::default();
        let businesses = match self.store.businesses() {
            Ok(businesses) => businesses,
            Err(err) => {
                error!(error = %err, "watcher could not read businesses");
                return report;
            }
        };
        for business in &businesses {
            if let Err(err) = self.scan_business(business, &mut report, keep_going) {
                report.failed_businesses += 1;
                warn!(business = %business.name, error = %err, "business scan failed");
            }
            if report.interrupted {
                return report;
            }
        }
        if let Some(recurring) = &self.recurring {
            match recurring.generate_now() {
                Ok(summary) => report.generated = summary.created.len(),
                Err(err) => warn!(error = %err, "recurring generation failed"),
            }
        }
        report
    }

    fn scan_business(
        &self,
        business: &Business,
        report: &mut ScanReport,
        keep_going: &dyn Fn() -> bool,
    ) -> Result<(), CoreError> {
        let layout = self.lifecycle.layout();
        for kind in Kind::ALL {
            let dir = layout.inbox_dir(Some(business), kind);
            if !dir.is_dir() {
                debug!(path = %dir.display(), "inbox folder missing");
                continue;
            }
            let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|path| path.is_file() && layout.is_accepted(path))
                .collect();
            files.sort();
            for path in files {
                if !keep_going() {
                    report.interrupted = true;
                    return Ok(());
                }
                self.process_file(business, &path, report);
            }
        }
        Ok(())
    }

    fn process_file(&self, business: &Business, path: &Path, report: &mut ScanReport) {
        let registration = match self.lifecycle.register_file(Some(business.id), path) {
            Ok(registration) => registration,
            Err(err) => {
                report.failed_files += 1;
                warn!(path = %path.display(), error = %err, "file not registered");
                return;
            }
        };
        if registration.created {
            report.discovered += 1;
        } else {
            match self.lifecycle.get(registration.record_id) {
                Ok(record) if record.state() == LifecycleState::Ingested => {}
                Ok(_) => return,
                Err(err) => {
                    report.failed_files += 1;
                    warn!(path = %path.display(), error = %err, "record lookup failed");
                    return;
                }
            }
        }
        match self.lifecycle.extract(registration.record_id) {
            Ok(state) => {
                report.extracted += 1;
                if state == LifecycleState::Archived {
                    report.archived += 1;
                } else {
                    report.awaiting_review += 1;
                }
            }
            Err(err) => {
                report.failed_files += 1;
                warn!(path = %path.display(), error = %err, "extraction will be retried");
            }
        }
    }
}
