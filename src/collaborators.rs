//! Collaborators that work without external services.
//!
//! [`SidecarJsonExtractor`] reads fields prepared by an upstream OCR step from a JSON file
//! next to the scan. [`TextPlaceholderRenderer`] writes a plain-text stand-in for bookings
//! that have no paper scan.

use std::{
    fs,
    path::{Path, PathBuf},
};

use beleg_core::{CoreError, Extraction, Extractor, PlaceholderRenderer, PlaceholderRequest};
use beleg_domain::Category;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

const SIDECAR_EXTENSION: &str = "json";

/// Fields a sidecar may carry. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct SidecarFields {
    date: Option<NaiveDate>,
    amount: Option<Decimal>,
    category: Option<String>,
    description: Option<String>,
    #[serde(default, alias = "raw_text")]
    text: String,
}

/// Reads `<scan>.json` (for `IMG_01.pdf` that is `IMG_01.pdf.json`). A scan without a
/// sidecar yields an empty extraction, which parks the record for manual review.
#[derive(Debug, Clone, Default)]
pub struct SidecarJsonExtractor;

impl SidecarJsonExtractor {
    pub fn sidecar_path(artifact: &Path) -> PathBuf {
        let mut name = artifact.as_os_str().to_owned();
        name.push(".");
        name.push(SIDECAR_EXTENSION);
        PathBuf::from(name)
    }
}

impl Extractor for SidecarJsonExtractor {
    fn extract(&self, artifact: &Path) -> Result<Extraction, CoreError> {
        if !artifact.is_file() {
            return Err(CoreError::Collaborator(format!(
                "{} is not readable",
                artifact.display()
            )));
        }
        let sidecar = Self::sidecar_path(artifact);
        if !sidecar.exists() {
            debug!(path = %artifact.display(), "no sidecar; nothing extracted");
            return Ok(Extraction::default());
        }
        let data = fs::read_to_string(&sidecar)
            .map_err(|err| CoreError::Collaborator(format!("{}: {err}", sidecar.display())))?;
        let fields: SidecarFields = serde_json::from_str(&data)
            .map_err(|err| CoreError::Collaborator(format!("{}: {err}", sidecar.display())))?;
        let category = fields.category.as_deref().and_then(|label| {
            let parsed = Category::parse(label);
            if parsed.is_none() {
                warn!(path = %sidecar.display(), label, "unknown category in sidecar");
            }
            parsed
        });
        Ok(Extraction {
            date: fields.date,
            amount: fields.amount,
            category,
            description: fields
                .description
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            raw_text: fields.text,
        })
    }

    fn companions(&self, artifact: &Path) -> Vec<PathBuf> {
        vec![Self::sidecar_path(artifact)]
    }
}

/// Renders a short UTF-8 text document describing the booking.
#[derive(Debug, Clone, Default)]
pub struct TextPlaceholderRenderer;

impl PlaceholderRenderer for TextPlaceholderRenderer {
    fn render_placeholder(&self, request: PlaceholderRequest<'_>) -> Result<Vec<u8>, CoreError> {
        let record = request.record;
        let mut lines = vec![
            "Beleg ohne Originaldokument".to_string(),
            String::new(),
            format!("Nummer:       {}", request.identifier),
            format!("Art:          {}", request.kind.folder_name()),
        ];
        if let Some(business) = request.business_name {
            lines.push(format!("Geschäft:     {business}"));
        }
        if let Some(date) = record.date {
            lines.push(format!("Datum:        {}", date.format("%d.%m.%Y")));
        }
        if let Some(amount) = record.amount {
            lines.push(format!("Betrag:       {} EUR", amount.round_dp(2)));
        }
        if let Some(category) = record.category {
            lines.push(format!("Kategorie:    {category}"));
        }
        if let Some(description) = &record.description {
            lines.push(format!("Beschreibung: {description}"));
        }
        if record.recurring_generated {
            lines.push(String::new());
            lines.push("Automatisch aus einer wiederkehrenden Buchung erzeugt.".into());
        }
        lines.push(String::new());
        Ok(lines.join("\n").into_bytes())
    }

    fn extension(&self) -> &str {
        "txt"
    }
}
