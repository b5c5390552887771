//! The ledger store seam and its in-process implementation.

use std::{collections::HashSet, path::Path, sync::Mutex};

use beleg_domain::{
    Business, Identifier, Kind, LedgerBook, Record, RecurringDefinition,
};
use chrono::NaiveDate;
use uuid::Uuid;

use crate::CoreError;

/// Durable holder of the [`LedgerBook`].
///
/// `transact` runs `op` as one atomic read-modify-write: either every change the closure
/// makes becomes visible (and durable, when the store persists) or none does.
pub trait LedgerStore: Send + Sync {
    fn read(&self, op: &mut dyn FnMut(&LedgerBook)) -> Result<(), CoreError>;
    fn transact(
        &self,
        op: &mut dyn FnMut(&mut LedgerBook) -> Result<(), CoreError>,
    ) -> Result<(), CoreError>;
}

/// Outcome of [`LedgerStoreExt::insert_occurrence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccurrenceInsert {
    Inserted,
    /// A record for the pair exists or the checkpoint already covers the date.
    Present,
    /// The definition was deleted or paused since the caller read it.
    Retired,
}

/// Persists a committed book. Called while the store lock is held.
pub trait SnapshotWriter: Send + Sync {
    fn write(&self, book: &LedgerBook) -> Result<(), CoreError>;
}

/// Typed operations shared by every [`LedgerStore`].
pub trait LedgerStoreExt: LedgerStore {
    fn query<T>(&self, op: impl FnOnce(&LedgerBook) -> T) -> Result<T, CoreError> {
        let mut op = Some(op);
        let mut output = None;
        self.read(&mut |book| {
            if let Some(op) = op.take() {
                output = Some(op(book));
            }
        })?;
        output.ok_or_else(|| CoreError::Storage("read callback was not invoked".into()))
    }

    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut LedgerBook) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut op = Some(op);
        let mut output = None;
        self.transact(&mut |book| {
            let op = op
                .take()
                .ok_or_else(|| CoreError::Storage("transaction replayed".into()))?;
            output = Some(op(book)?);
            Ok(())
        })?;
        output.ok_or_else(|| CoreError::Storage("transaction callback was not invoked".into()))
    }

    fn snapshot(&self) -> Result<LedgerBook, CoreError> {
        self.query(LedgerBook::clone)
    }

    fn record(&self, id: Uuid) -> Result<Record, CoreError> {
        self.query(|book| book.record(id).cloned())?
            .ok_or(CoreError::RecordNotFound(id))
    }

    fn records(&self) -> Result<Vec<Record>, CoreError> {
        self.query(|book| book.records.clone())
    }

    fn record_by_artifact(&self, path: &Path) -> Result<Option<Record>, CoreError> {
        self.query(|book| book.record_by_artifact(path).cloned())
    }

    /// Applies `update` to the stored record and returns the committed copy.
    fn update_record(
        &self,
        id: Uuid,
        update: impl FnOnce(&mut Record) -> Result<(), CoreError>,
    ) -> Result<Record, CoreError> {
        self.mutate(|book| {
            let record = book.record_mut(id).ok_or(CoreError::RecordNotFound(id))?;
            update(record)?;
            record.touch();
            Ok(record.clone())
        })
    }

    fn business(&self, id: Uuid) -> Result<Business, CoreError> {
        self.query(|book| book.business(id).cloned())?
            .ok_or(CoreError::BusinessNotFound(id))
    }

    fn businesses(&self) -> Result<Vec<Business>, CoreError> {
        self.query(|book| book.businesses.clone())
    }

    fn definition(&self, id: Uuid) -> Result<RecurringDefinition, CoreError> {
        self.query(|book| book.definition(id).cloned())?
            .ok_or(CoreError::DefinitionNotFound(id))
    }

    fn definitions(&self) -> Result<Vec<RecurringDefinition>, CoreError> {
        self.query(|book| book.definitions.clone())
    }

    fn max_sequence(
        &self,
        kind: Kind,
        business_prefix: Option<&str>,
        year: i32,
    ) -> Result<u32, CoreError> {
        self.query(|book| book.max_sequence(kind, business_prefix, year))
    }

    /// Reserves `identifier` if nobody holds it yet. Returns `false` on collision.
    fn claim_identifier(&self, identifier: &Identifier) -> Result<bool, CoreError> {
        self.mutate(|book| {
            if book.is_identifier_taken(identifier) {
                return Ok(false);
            }
            book.claimed_identifiers.insert(identifier.clone());
            Ok(true)
        })
    }

    /// Inserts a generated occurrence unless one already exists for its
    /// `(definition, date)` pair. The stored definition decides: a deleted or paused
    /// definition, or a date at or before its checkpoint, inserts nothing.
    fn insert_occurrence(&self, record: Record) -> Result<OccurrenceInsert, CoreError> {
        let (Some(definition_id), Some(date)) = (record.recurring_id, record.date) else {
            return Err(CoreError::validation(
                "recurring_id",
                "generated records need a definition and a date",
            ));
        };
        self.mutate(|book| {
            let Some(definition) = book.definition(definition_id) else {
                return Ok(OccurrenceInsert::Retired);
            };
            if !definition.active {
                return Ok(OccurrenceInsert::Retired);
            }
            let processed = definition
                .last_generated
                .is_some_and(|checkpoint| date <= checkpoint);
            if processed || book.has_occurrence(definition_id, date) {
                return Ok(OccurrenceInsert::Present);
            }
            book.records.push(record);
            Ok(OccurrenceInsert::Inserted)
        })
    }

    /// Moves a definition's checkpoint forward to `processed`.
    fn advance_checkpoint(
        &self,
        definition_id: Uuid,
        processed: NaiveDate,
    ) -> Result<bool, CoreError> {
        self.mutate(|book| {
            let definition = book
                .definition_mut(definition_id)
                .ok_or(CoreError::DefinitionNotFound(definition_id))?;
            Ok(definition.advance_checkpoint(processed))
        })
    }
}

impl<S: LedgerStore + ?Sized> LedgerStoreExt for S {}

/// [`LedgerStore`] guarding a [`LedgerBook`] with a mutex. Every transaction works on a
/// copy that replaces the live book only after the closure and the snapshot writer succeed.
pub struct BookStore {
    book: Mutex<LedgerBook>,
    writer: Option<Box<dyn SnapshotWriter>>,
}

impl BookStore {
    pub fn in_memory(book: LedgerBook) -> Self {
        Self {
            book: Mutex::new(book),
            writer: None,
        }
    }

    pub fn with_writer(book: LedgerBook, writer: Box<dyn SnapshotWriter>) -> Self {
        Self {
            book: Mutex::new(book),
            writer: Some(writer),
        }
    }

    fn poisoned() -> CoreError {
        CoreError::Storage("ledger lock poisoned".into())
    }
}

impl std::fmt::Debug for BookStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookStore")
            .field("book", &self.book)
            .field("has_writer", &self.writer.is_some())
            .finish()
    }
}

impl Default for BookStore {
    fn default() -> Self {
        Self::in_memory(LedgerBook::new())
    }
}

impl LedgerStore for BookStore {
    fn read(&self, op: &mut dyn FnMut(&LedgerBook)) -> Result<(), CoreError> {
        let guard = self.book.lock().map_err(|_| Self::poisoned())?;
        op(&guard);
        Ok(())
    }

    fn transact(
        &self,
        op: &mut dyn FnMut(&mut LedgerBook) -> Result<(), CoreError>,
    ) -> Result<(), CoreError> {
        let mut guard = self.book.lock().map_err(|_| Self::poisoned())?;
        let mut working = guard.clone();
        op(&mut working)?;
        working.touch();
        if let Some(writer) = &self.writer {
            writer.write(&working)?;
        }
        *guard = working;
        Ok(())
    }
}

/// Detects dangling references and duplicate identifiers within a book.
pub fn book_warnings(book: &LedgerBook) -> Vec<String> {
    let business_ids: HashSet<_> = book.businesses.iter().map(|b| b.id).collect();
    let definition_ids: HashSet<_> = book.definitions.iter().map(|d| d.id).collect();
    let mut seen = HashSet::new();
    let mut warnings = Vec::new();

    for record in &book.records {
        if let Some(business) = record.business_id {
            if !business_ids.contains(&business) {
                warnings.push(format!(
                    "record {} references unknown business {}",
                    record.id, business
                ));
            }
        }
        if let Some(definition) = record.recurring_id {
            if !definition_ids.contains(&definition) {
                warnings.push(format!(
                    "record {} references missing recurring definition {}",
                    record.id, definition
                ));
            }
        }
        if let Some(identifier) = &record.identifier {
            if !seen.insert(identifier.clone()) {
                warnings.push(format!("identifier {identifier} is assigned more than once"));
            }
        }
        if record.archived && record.identifier.is_none() {
            warnings.push(format!("record {} is archived without identifier", record.id));
        }
    }
    for definition in &book.definitions {
        if let Some(business) = definition.business_id {
            if !business_ids.contains(&business) {
                warnings.push(format!(
                    "recurring definition {} references unknown business {}",
                    definition.id, business
                ));
            }
        }
    }
    warnings
}
