#![doc(test(attr(deny(warnings))))]

//! Beleg archives receipts and invoices: scans dropped into per-business inbox folders are
//! extracted, given a permanent identifier and filed into a year-based archive, while
//! recurring bookings are materialized on schedule.
//!
//! The crate wires the workspace services together behind [`Beleg`] and ships the `beleg`
//! command line tool.

pub mod app;
pub mod cli;
pub mod collaborators;
pub mod errors;
pub mod utils;

pub use app::Beleg;
pub use collaborators::{SidecarJsonExtractor, TextPlaceholderRenderer};
pub use errors::AppError;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Beleg tracing initialized.");
    });
}
