//! beleg-core
//!
//! Document lifecycle services for Beleg: identifier allocation, recurring generation,
//! the archival state machine and the inbox watcher.
//! Depends on beleg-domain. No CLI and no concrete persistence format.

pub mod allocator;
pub mod business_service;
pub mod collaborators;
pub mod error;
pub mod layout;
pub mod lifecycle_service;
pub mod naming;
pub mod recurring_service;
pub mod schedule_service;
pub mod storage;
pub mod summary_service;
pub mod time;
pub mod watcher;

pub use allocator::IdAllocator;
pub use business_service::*;
pub use collaborators::*;
pub use error::CoreError;
pub use layout::ArchiveLayout;
pub use lifecycle_service::*;
pub use naming::archive_filename;
pub use recurring_service::*;
pub use schedule_service::*;
pub use storage::{BookStore, LedgerStore, LedgerStoreExt, OccurrenceInsert, SnapshotWriter};
pub use summary_service::*;
pub use time::{Clock, FixedClock, SystemClock};
pub use watcher::*;
