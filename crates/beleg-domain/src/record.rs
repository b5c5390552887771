//! Financial document records and the typed patches and filters applied to them.

use std::{fmt, path::{Path, PathBuf}};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{common::*, identifier::Identifier, kind::{Category, Kind}};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: Uuid,
    pub business_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    pub date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    /// Scan or placeholder backing this record.
    pub artifact: Option<PathBuf>,
    #[serde(default)]
    pub extracted: bool,
    #[serde(default)]
    pub reviewed: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default = "Record::default_unread")]
    pub unread: bool,
    #[serde(default)]
    pub flagged: bool,
    pub identifier: Option<Identifier>,
    #[serde(default)]
    pub recurring_id: Option<Uuid>,
    #[serde(default)]
    pub recurring_generated: bool,
    /// The artifact was rendered rather than scanned.
    #[serde(default)]
    pub placeholder: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    fn blank(business_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            business_id,
            original_filename: None,
            date: None,
            amount: None,
            category: None,
            description: None,
            raw_text: None,
            artifact: None,
            extracted: false,
            reviewed: false,
            archived: false,
            unread: true,
            flagged: false,
            identifier: None,
            recurring_id: None,
            recurring_generated: false,
            placeholder: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// A freshly discovered inbox file, before extraction.
    pub fn ingested(business_id: Option<Uuid>, artifact: PathBuf) -> Self {
        let mut record = Self::blank(business_id);
        record.original_filename = artifact
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string);
        record.artifact = Some(artifact);
        record
    }

    /// An occurrence materialized from a recurring definition. It carries the definition's
    /// booking fields and starts out extracted but without artifact or identifier.
    pub fn scheduled(
        business_id: Option<Uuid>,
        recurring_id: Uuid,
        date: NaiveDate,
        amount: Decimal,
        category: Category,
        description: impl Into<String>,
    ) -> Self {
        let mut record = Self::blank(business_id);
        record.date = Some(date);
        record.amount = Some(amount);
        record.category = Some(category);
        record.description = Some(description.into());
        record.extracted = true;
        record.recurring_id = Some(recurring_id);
        record.recurring_generated = true;
        record
    }

    /// A manually entered booking whose fields are already confirmed.
    pub fn manual(
        business_id: Option<Uuid>,
        date: NaiveDate,
        amount: Decimal,
        category: Category,
        description: impl Into<String>,
    ) -> Self {
        let mut record = Self::blank(business_id);
        record.date = Some(date);
        record.amount = Some(amount);
        record.category = Some(category);
        record.description = Some(description.into());
        record.extracted = true;
        record.reviewed = true;
        record.unread = false;
        record
    }

    pub fn default_unread() -> bool {
        true
    }

    pub fn state(&self) -> LifecycleState {
        if self.archived && self.identifier.is_some() {
            LifecycleState::Archived
        } else if self.reviewed {
            LifecycleState::Reviewed
        } else if self.extracted {
            LifecycleState::Extracted
        } else {
            LifecycleState::Ingested
        }
    }

    /// Kind derived from the identifier prefix, or from the kind folder the artifact sits in.
    pub fn kind(&self) -> Option<Kind> {
        self.identifier
            .as_ref()
            .map(Identifier::kind)
            .or_else(|| self.artifact.as_deref().and_then(kind_from_path))
    }

    /// Returns date, amount and category when all three are present.
    pub fn mandatory_fields(&self) -> Option<(NaiveDate, Decimal, Category)> {
        Some((self.date?, self.amount?, self.category?))
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.date.is_none() {
            missing.push("date");
        }
        if self.amount.is_none() {
            missing.push("amount");
        }
        if self.category.is_none() {
            missing.push("category");
        }
        missing
    }

    pub fn year(&self) -> Option<i32> {
        self.date.map(|date| date.year())
    }

    /// Whether the artifact is a real scan as opposed to a rendered placeholder.
    pub fn has_scan(&self) -> bool {
        self.artifact.is_some() && !self.placeholder
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Identifiable for Record {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Displayable for Record {
    fn display_label(&self) -> String {
        match &self.identifier {
            Some(identifier) => format!("{identifier} [{}]", self.state()),
            None => format!("record:{} [{}]", self.id, self.state()),
        }
    }
}

/// Finds the nearest ancestor directory named after a kind folder.
pub fn kind_from_path(path: &Path) -> Option<Kind> {
    path.ancestors()
        .skip(1)
        .filter_map(|ancestor| ancestor.file_name().and_then(|name| name.to_str()))
        .find_map(Kind::from_folder_name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Position of a record in its lifecycle.
pub enum LifecycleState {
    Ingested,
    Extracted,
    Reviewed,
    Archived,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LifecycleState::Ingested => "Ingested",
            LifecycleState::Extracted => "Extracted",
            LifecycleState::Reviewed => "Reviewed",
            LifecycleState::Archived => "Archived",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Partial update of the user-editable fields of a [`Record`].
pub struct RecordPatch {
    pub date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub category: Option<Category>,
    pub description: Option<String>,
    pub unread: Option<bool>,
    pub flagged: Option<bool>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }

    /// Returns `true` when applying the patch changes a field the archive filename is built from.
    pub fn changes_filename_of(&self, record: &Record) -> bool {
        self.date.is_some_and(|date| record.date != Some(date))
            || self.amount.is_some_and(|amount| record.amount != Some(amount))
            || self
                .category
                .is_some_and(|category| record.category != Some(category))
            || self
                .description
                .as_ref()
                .is_some_and(|description| record.description.as_ref() != Some(description))
    }

    /// Applies every present field, returning whether anything changed.
    pub fn apply_to(&self, record: &mut Record) -> bool {
        let before = record.clone();
        if let Some(date) = self.date {
            record.date = Some(date);
        }
        if let Some(amount) = self.amount {
            record.amount = Some(amount);
        }
        if let Some(category) = self.category {
            record.category = Some(category);
        }
        if let Some(description) = &self.description {
            record.description = Some(description.clone());
        }
        if let Some(unread) = self.unread {
            record.unread = unread;
        }
        if let Some(flagged) = self.flagged {
            record.flagged = flagged;
        }
        let changed = *record != before;
        if changed {
            record.touch();
        }
        changed
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Query filter for listing records. Unset fields match everything.
pub struct RecordFilter {
    pub kind: Option<Kind>,
    pub category: Option<Category>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub year: Option<i32>,
    pub business_id: Option<Uuid>,
    pub state: Option<LifecycleState>,
    /// Case-insensitive match on description or identifier.
    pub search: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(kind) = self.kind {
            if record.kind() != Some(kind) {
                return false;
            }
        }
        if let Some(category) = self.category {
            if record.category != Some(category) {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if record.date.map_or(true, |date| date < from) {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if record.date.map_or(true, |date| date > to) {
                return false;
            }
        }
        if let Some(year) = self.year {
            if record.year() != Some(year) {
                return false;
            }
        }
        if let Some(business_id) = self.business_id {
            if record.business_id != Some(business_id) {
                return false;
            }
        }
        if let Some(state) = self.state {
            if record.state() != state {
                return false;
            }
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = term.to_lowercase();
            let in_description = record
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            let in_identifier = record
                .identifier
                .as_ref()
                .is_some_and(|id| id.to_string().to_lowercase().contains(&needle));
            if !in_description && !in_identifier {
                return false;
            }
        }
        true
    }
}
