//! Seams to the external extraction and rendering services.

use std::path::{Path, PathBuf};

use beleg_domain::{Category, Identifier, Kind, Record};
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::CoreError;

/// Best-effort fields read from a scan. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub category: Option<Category>,
    pub description: Option<String>,
    pub raw_text: String,
}

impl Extraction {
    /// Date, amount and category are all present.
    pub fn is_complete(&self) -> bool {
        self.date.is_some() && self.amount.is_some() && self.category.is_some()
    }
}

/// Reads structured fields from an artifact on disk. Calls may block.
pub trait Extractor: Send + Sync {
    fn extract(&self, artifact: &Path) -> Result<Extraction, CoreError>;

    /// Files beside `artifact` that were read with it. They are removed once the
    /// artifact has been moved into the archive.
    fn companions(&self, _artifact: &Path) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// What the renderer needs to synthesize a placeholder for an archived record.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderRequest<'a> {
    pub record: &'a Record,
    pub identifier: &'a Identifier,
    pub kind: Kind,
    pub business_name: Option<&'a str>,
}

/// Produces placeholder artifact bytes for records without a physical scan.
pub trait PlaceholderRenderer: Send + Sync {
    fn render_placeholder(&self, request: PlaceholderRequest<'_>) -> Result<Vec<u8>, CoreError>;

    /// Extension of the rendered artifact, without dot.
    fn extension(&self) -> &str {
        "pdf"
    }
}
