//! The persisted aggregate: businesses, records, recurring definitions and claimed identifiers.

use std::{collections::BTreeSet, path::Path};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    business::Business, identifier::Identifier, kind::Kind, record::Record,
    recurring::RecurringDefinition,
};

pub const CURRENT_SCHEMA_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerBook {
    #[serde(default = "LedgerBook::schema_version_default")]
    pub schema_version: u8,
    #[serde(default)]
    pub businesses: Vec<Business>,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub definitions: Vec<RecurringDefinition>,
    /// Every identifier ever handed out, including ones whose record was later deleted
    /// or whose archive step failed. Sequences are never reissued.
    #[serde(default)]
    pub claimed_identifiers: BTreeSet<Identifier>,
    pub updated_at: DateTime<Utc>,
}

impl Default for LedgerBook {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerBook {
    pub fn new() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            businesses: Vec::new(),
            records: Vec::new(),
            definitions: Vec::new(),
            claimed_identifiers: BTreeSet::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn schema_version_default() -> u8 {
        CURRENT_SCHEMA_VERSION
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn business(&self, id: Uuid) -> Option<&Business> {
        self.businesses.iter().find(|business| business.id == id)
    }

    pub fn business_mut(&mut self, id: Uuid) -> Option<&mut Business> {
        self.businesses.iter_mut().find(|business| business.id == id)
    }

    /// Case-insensitive lookup by display name.
    pub fn business_by_name(&self, name: &str) -> Option<&Business> {
        self.businesses
            .iter()
            .find(|business| business.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn business_by_prefix(&self, prefix: &str) -> Option<&Business> {
        self.businesses
            .iter()
            .find(|business| business.prefix.eq_ignore_ascii_case(prefix.trim()))
    }

    pub fn record(&self, id: Uuid) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn record_mut(&mut self, id: Uuid) -> Option<&mut Record> {
        self.records.iter_mut().find(|record| record.id == id)
    }

    pub fn record_by_artifact(&self, path: &Path) -> Option<&Record> {
        self.records
            .iter()
            .find(|record| record.artifact.as_deref() == Some(path))
    }

    pub fn record_by_identifier(&self, identifier: &Identifier) -> Option<&Record> {
        self.records
            .iter()
            .find(|record| record.identifier.as_ref() == Some(identifier))
    }

    pub fn definition(&self, id: Uuid) -> Option<&RecurringDefinition> {
        self.definitions.iter().find(|definition| definition.id == id)
    }

    pub fn definition_mut(&mut self, id: Uuid) -> Option<&mut RecurringDefinition> {
        self.definitions
            .iter_mut()
            .find(|definition| definition.id == id)
    }

    /// Kind of a record: identifier prefix, artifact folder, then the spawning definition.
    pub fn kind_of(&self, record: &Record) -> Option<Kind> {
        record.kind().or_else(|| {
            record
                .recurring_id
                .and_then(|id| self.definition(id))
                .map(|definition| definition.kind)
        })
    }

    /// Whether a record for `(definition, date)` already exists.
    pub fn has_occurrence(&self, definition_id: Uuid, date: NaiveDate) -> bool {
        self.records
            .iter()
            .any(|record| record.recurring_id == Some(definition_id) && record.date == Some(date))
    }

    /// Number of records generated from the given definition.
    pub fn occurrence_count(&self, definition_id: Uuid) -> usize {
        self.records
            .iter()
            .filter(|record| record.recurring_id == Some(definition_id))
            .count()
    }

    pub fn is_identifier_taken(&self, identifier: &Identifier) -> bool {
        self.claimed_identifiers.contains(identifier)
            || self.record_by_identifier(identifier).is_some()
    }

    /// Highest sequence used in the `(kind, business prefix, year)` series, 0 when empty.
    pub fn max_sequence(&self, kind: Kind, business_prefix: Option<&str>, year: i32) -> u32 {
        let claimed = self.claimed_identifiers.iter();
        let assigned = self.records.iter().filter_map(|record| record.identifier.as_ref());
        claimed
            .chain(assigned)
            .filter(|identifier| identifier.in_series(kind, business_prefix, year))
            .map(Identifier::sequence)
            .max()
            .unwrap_or(0)
    }

    /// Counts the records and definitions that reference `business_id`.
    pub fn dependents_of(&self, business_id: Uuid) -> (usize, usize) {
        let records = self
            .records
            .iter()
            .filter(|record| record.business_id == Some(business_id))
            .count();
        let definitions = self
            .definitions
            .iter()
            .filter(|definition| definition.business_id == Some(business_id))
            .count();
        (records, definitions)
    }
}
