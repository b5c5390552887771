//! The record state machine: Ingested → Extracted → Reviewed → Archived.
//!
//! Stored fields are the source of truth. Every transition commits to the ledger first and
//! touches the filesystem afterwards; a failed move or write is logged and leaves the record
//! in its committed state with its previous artifact path, which
//! [`LifecycleService::stale_artifacts`] reports for manual reconciliation.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use beleg_domain::{
    Business, Category, Identifier, Kind, LifecycleState, Record, RecordFilter, RecordPatch,
};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    layout::{relocate, write_artifact},
    naming::archive_filename,
    storage::LedgerStoreExt,
    ArchiveLayout, CoreError, Extractor, IdAllocator, LedgerStore, PlaceholderRenderer,
    PlaceholderRequest,
};

/// Outcome of registering an inbox file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub record_id: Uuid,
    pub created: bool,
}

/// A complete booking entered by hand.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualEntry {
    pub business_id: Option<Uuid>,
    pub kind: Kind,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub category: Category,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// Archived without any artifact path.
    Absent,
    /// The stored path does not exist on disk.
    Missing,
    /// The file exists but outside its canonical archive location.
    Misplaced,
}

#[derive(Debug, Clone)]
pub struct StaleArtifact {
    pub record: Record,
    pub expected: Option<PathBuf>,
    pub reason: StaleReason,
}

struct Placement {
    business: Option<Business>,
    kind: Kind,
}

pub struct LifecycleService {
    store: Arc<dyn LedgerStore>,
    allocator: IdAllocator,
    extractor: Arc<dyn Extractor>,
    renderer: Arc<dyn PlaceholderRenderer>,
    layout: ArchiveLayout,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        allocator: IdAllocator,
        extractor: Arc<dyn Extractor>,
        renderer: Arc<dyn PlaceholderRenderer>,
        layout: ArchiveLayout,
    ) -> Self {
        Self {
            store,
            allocator,
            extractor,
            renderer,
            layout,
        }
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    pub fn get(&self, id: Uuid) -> Result<Record, CoreError> {
        self.store.record(id)
    }

    /// Records matching `filter`, newest date first.
    pub fn list(&self, filter: &RecordFilter) -> Result<Vec<Record>, CoreError> {
        let mut records = self.store.query(|book| {
            book.records
                .iter()
                .filter(|record| filter.matches(record))
                .cloned()
                .collect::<Vec<_>>()
        })?;
        records.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(records)
    }

    /// Registers an inbox file unless a record already points at it.
    pub fn register_file(
        &self,
        business_id: Option<Uuid>,
        path: &Path,
    ) -> Result<Registration, CoreError> {
        let registration = self.store.mutate(|book| {
            if let Some(existing) = book.record_by_artifact(path) {
                return Ok(Registration {
                    record_id: existing.id,
                    created: false,
                });
            }
            let record = Record::ingested(business_id, path.to_path_buf());
            let record_id = record.id;
            book.records.push(record);
            Ok(Registration {
                record_id,
                created: true,
            })
        })?;
        if registration.created {
            info!(record = %registration.record_id, path = %path.display(), "file registered");
        }
        Ok(registration)
    }

    /// Runs the extraction collaborator and auto-archives when date, amount and category
    /// are all present afterwards. Collaborator failures leave the record unchanged.
    pub fn extract(&self, id: Uuid) -> Result<LifecycleState, CoreError> {
        let record = self.store.record(id)?;
        if record.archived {
            return Err(CoreError::InvalidTransition(format!(
                "record {id} is already archived"
            )));
        }
        let artifact = record.artifact.clone().ok_or_else(|| {
            CoreError::InvalidTransition(format!("record {id} has no artifact to extract"))
        })?;
        let extraction = self.extractor.extract(&artifact).map_err(|err| {
            warn!(record = %id, path = %artifact.display(), error = %err, "extraction failed");
            err
        })?;
        let kind = self.store.query(|book| book.kind_of(&record))?;
        let category = match (extraction.category, kind) {
            (Some(category), Some(kind)) if !category.is_valid_for(kind) => {
                warn!(record = %id, %category, %kind, "extracted category does not fit the kind");
                None
            }
            (category, _) => category,
        };

        let updated = self.store.update_record(id, |stored| {
            if stored.archived {
                return Err(CoreError::InvalidTransition(format!(
                    "record {id} was archived during extraction"
                )));
            }
            stored.date = stored.date.or(extraction.date);
            stored.amount = stored.amount.or(extraction.amount);
            stored.category = stored.category.or(category);
            if stored.description.is_none() {
                stored.description = extraction.description.clone();
            }
            if !extraction.raw_text.trim().is_empty() {
                stored.raw_text = Some(extraction.raw_text.clone());
            }
            stored.extracted = true;
            Ok(())
        })?;

        if updated.mandatory_fields().is_none() {
            warn!(
                record = %id,
                missing = ?updated.missing_fields(),
                "extraction incomplete; awaiting manual review"
            );
            return Ok(updated.state());
        }
        info!(record = %id, "extraction complete; auto-archiving");
        Ok(self.archive(id)?.state())
    }

    /// Confirms the reviewer's fields and archives the record.
    pub fn review(&self, id: Uuid, patch: &RecordPatch) -> Result<Record, CoreError> {
        let record = self.store.record(id)?;
        if record.archived {
            return Err(CoreError::InvalidTransition(format!(
                "record {id} is already archived; edit its fields instead"
            )));
        }
        let mut merged = record.clone();
        patch.apply_to(&mut merged);
        if let Some(field) = merged.missing_fields().first().copied() {
            return Err(CoreError::validation(field, "is required to complete the review"));
        }
        let placement = self.placement(&merged)?;
        if let Some(category) = merged.category {
            validate_category(placement.kind, category)?;
        }
        self.store.update_record(id, |stored| {
            patch.apply_to(stored);
            stored.extracted = true;
            stored.unread = false;
            Ok(())
        })?;
        self.archive(id)
    }

    /// Assigns an identifier and moves or renders the artifact into the archive.
    ///
    /// The placeholder is rendered before anything is committed, so a renderer failure
    /// leaves the record untouched. The identifier is claimed first and stays claimed.
    pub fn archive(&self, id: Uuid) -> Result<Record, CoreError> {
        let record = self.store.record(id)?;
        if record.archived && record.identifier.is_some() {
            return Ok(record);
        }
        let (date, _, category) = mandatory(&record)?;
        let placement = self.placement(&record)?;
        validate_category(placement.kind, category)?;

        let identifier = match record.identifier.clone() {
            Some(existing) => existing,
            None => self.allocator.allocate(
                placement.kind,
                date.year(),
                placement.business.as_ref().map(|b| b.prefix.as_str()),
            )?,
        };
        let has_scan = record.has_scan();
        let target = self.canonical_path(&record, &identifier, &placement)?;
        let placeholder = if has_scan {
            None
        } else {
            Some(self.render(&record, &identifier, &placement)?)
        };

        let committed = self.store.mutate(|book| {
            let stored = book.record_mut(id).ok_or(CoreError::RecordNotFound(id))?;
            if stored.archived && stored.identifier.is_some() {
                return Ok(None);
            }
            stored.identifier = Some(identifier.clone());
            stored.extracted = true;
            stored.reviewed = true;
            stored.archived = true;
            stored.placeholder = !has_scan;
            stored.touch();
            Ok(Some(stored.clone()))
        })?;
        let Some(committed) = committed else {
            debug!(record = %id, unused = %identifier, "record archived concurrently");
            return self.store.record(id);
        };
        info!(record = %id, identifier = %identifier, "record archived");

        let placed = match (&placeholder, record.artifact.as_deref()) {
            (Some(bytes), _) => write_artifact(&target, bytes),
            (None, Some(source)) => relocate(source, &target),
            (None, None) => Err(no_artifact()),
        };
        if let (Ok(()), None, Some(source)) = (&placed, &placeholder, record.artifact.as_deref()) {
            self.discard_companions(source);
        }
        Ok(self.finish_placement(committed, &target, placed))
    }

    /// Applies a field patch. On an archived record a change to date, amount, category or
    /// description re-derives the filename and moves the artifact; the identifier is kept.
    /// Extraction is never re-run.
    pub fn update_fields(&self, id: Uuid, patch: &RecordPatch) -> Result<Record, CoreError> {
        let record = self.store.record(id)?;
        if patch.is_empty() {
            return Ok(record);
        }
        let mut updated = record.clone();
        patch.apply_to(&mut updated);
        let kind = self.store.query(|book| book.kind_of(&updated))?;
        if let (Some(kind), Some(category)) = (kind, patch.category) {
            validate_category(kind, category)?;
        }
        if !(record.archived && patch.changes_filename_of(&record)) {
            return self.store.update_record(id, |stored| {
                patch.apply_to(stored);
                Ok(())
            });
        }

        let identifier = updated.identifier.clone().ok_or_else(|| {
            CoreError::InvalidTransition(format!("archived record {id} has no identifier"))
        })?;
        let placement = self.placement(&updated)?;
        let target = self.canonical_path(&updated, &identifier, &placement)?;
        let placeholder = if updated.placeholder {
            Some(self.render(&updated, &identifier, &placement)?)
        } else {
            None
        };

        let committed = self.store.update_record(id, |stored| {
            patch.apply_to(stored);
            Ok(())
        })?;
        info!(record = %id, identifier = %identifier, "archived record edited");

        let placed = match (&placeholder, record.artifact.as_deref()) {
            (Some(bytes), previous) => write_artifact(&target, bytes).and_then(|()| {
                match previous {
                    Some(old) if old != target && old.exists() => fs::remove_file(old),
                    _ => Ok(()),
                }
            }),
            (None, Some(source)) => relocate(source, &target),
            (None, None) => Err(no_artifact()),
        };
        Ok(self.finish_placement(committed, &target, placed))
    }

    /// Removes the record and, unless it is a generated occurrence without a real scan,
    /// its artifact.
    pub fn delete(&self, id: Uuid) -> Result<Record, CoreError> {
        let removed = self.store.mutate(|book| {
            let index = book
                .records
                .iter()
                .position(|record| record.id == id)
                .ok_or(CoreError::RecordNotFound(id))?;
            Ok(book.records.remove(index))
        })?;
        let keep_artifact = removed.recurring_generated && !removed.has_scan();
        if let Some(path) = removed.artifact.as_deref().filter(|_| !keep_artifact) {
            if path.exists() {
                if let Err(err) = fs::remove_file(path) {
                    warn!(record = %id, path = %path.display(), error = %err, "artifact not removed");
                }
            }
        }
        info!(record = %id, "record deleted");
        Ok(removed)
    }

    /// Creates an already reviewed booking and archives it with a rendered placeholder.
    pub fn create_manual(&self, entry: ManualEntry) -> Result<Record, CoreError> {
        validate_category(entry.kind, entry.category)?;
        if entry.description.trim().is_empty() {
            return Err(CoreError::validation("description", "must not be empty"));
        }
        let business = entry
            .business_id
            .map(|business_id| self.store.business(business_id))
            .transpose()?;
        let placement = Placement {
            business,
            kind: entry.kind,
        };
        let mut record = Record::manual(
            entry.business_id,
            entry.date,
            entry.amount,
            entry.category,
            entry.description.trim(),
        );
        let identifier = self.allocator.allocate(
            entry.kind,
            entry.date.year(),
            placement.business.as_ref().map(|b| b.prefix.as_str()),
        )?;
        let bytes = self.render(&record, &identifier, &placement)?;
        let target = self.canonical_path(&record, &identifier, &placement)?;
        record.identifier = Some(identifier.clone());
        record.archived = true;
        record.placeholder = true;

        let committed = record.clone();
        self.store.mutate(move |book| {
            book.records.push(record);
            Ok(())
        })?;
        info!(record = %committed.id, identifier = %identifier, "manual record archived");
        let placed = write_artifact(&target, &bytes);
        Ok(self.finish_placement(committed, &target, placed))
    }

    /// Replaces the record's artifact with a real scan.
    ///
    /// An archived record gets the file copied to its canonical location. Any other record
    /// adopts `source` as its artifact and runs through extraction.
    pub fn attach_scan(&self, id: Uuid, source: &Path) -> Result<Record, CoreError> {
        if !source.is_file() {
            return Err(CoreError::validation(
                "artifact",
                format!("{} is not a file", source.display()),
            ));
        }
        let record = self.store.record(id)?;
        if !record.archived {
            self.store.update_record(id, |stored| {
                stored.artifact = Some(source.to_path_buf());
                stored.placeholder = false;
                Ok(())
            })?;
            if let Err(err) = self.extract(id) {
                warn!(record = %id, error = %err, "attached scan could not be processed yet");
            }
            return self.store.record(id);
        }

        let identifier = record.identifier.clone().ok_or_else(|| {
            CoreError::InvalidTransition(format!("archived record {id} has no identifier"))
        })?;
        let placement = self.placement(&record)?;
        let mut scanned = record.clone();
        scanned.artifact = Some(source.to_path_buf());
        scanned.placeholder = false;
        let target = self.canonical_path(&scanned, &identifier, &placement)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, &target)?;

        let committed = self.store.update_record(id, |stored| {
            stored.artifact = Some(target.clone());
            stored.placeholder = false;
            Ok(())
        })?;
        if let Some(old) = record.artifact.as_deref() {
            if old != target && old.exists() {
                if let Err(err) = fs::remove_file(old) {
                    warn!(record = %id, path = %old.display(), error = %err, "replaced artifact not removed");
                }
            }
        }
        info!(record = %id, identifier = %identifier, "scan attached");
        Ok(committed)
    }

    pub fn mark_read(&self, id: Uuid) -> Result<Record, CoreError> {
        self.store.update_record(id, |record| {
            record.unread = false;
            Ok(())
        })
    }

    pub fn set_flagged(&self, id: Uuid, flagged: bool) -> Result<Record, CoreError> {
        self.store.update_record(id, |record| {
            record.flagged = flagged;
            Ok(())
        })
    }

    pub fn toggle_flag(&self, id: Uuid) -> Result<Record, CoreError> {
        self.store.update_record(id, |record| {
            record.flagged = !record.flagged;
            Ok(())
        })
    }

    /// Archives every generated occurrence that has no identifier yet, rendering its
    /// placeholder. Returns the ids archived in this pass.
    pub fn materialize_placeholders(&self) -> Result<Vec<Uuid>, CoreError> {
        let pending = self.store.query(|book| {
            book.records
                .iter()
                .filter(|record| record.recurring_generated && record.identifier.is_none())
                .map(|record| record.id)
                .collect::<Vec<_>>()
        })?;
        let mut archived = Vec::new();
        for id in pending {
            match self.archive(id) {
                Ok(_) => archived.push(id),
                Err(err) => warn!(record = %id, error = %err, "placeholder not materialized"),
            }
        }
        Ok(archived)
    }

    /// Archived records whose artifact is absent, missing on disk or not at its canonical
    /// location.
    pub fn stale_artifacts(&self) -> Result<Vec<StaleArtifact>, CoreError> {
        let book = self.store.snapshot()?;
        let mut stale = Vec::new();
        for record in book.records.iter().filter(|record| record.archived) {
            let expected = record.identifier.as_ref().and_then(|identifier| {
                let kind = book.kind_of(record)?;
                let business = record.business_id.and_then(|id| book.business(id)).cloned();
                self.canonical_path(record, identifier, &Placement { business, kind })
                    .ok()
            });
            let reason = match record.artifact.as_deref() {
                None => Some(StaleReason::Absent),
                Some(path) if !path.exists() => Some(StaleReason::Missing),
                Some(path) if expected.as_deref().is_some_and(|e| e != path) => {
                    Some(StaleReason::Misplaced)
                }
                Some(_) => None,
            };
            if let Some(reason) = reason {
                stale.push(StaleArtifact {
                    record: record.clone(),
                    expected,
                    reason,
                });
            }
        }
        Ok(stale)
    }

    fn placement(&self, record: &Record) -> Result<Placement, CoreError> {
        let (kind, business) = self.store.query(|book| {
            let business = record.business_id.map(|id| book.business(id).cloned());
            (book.kind_of(record), business)
        })?;
        let kind = kind.ok_or_else(|| {
            CoreError::validation("kind", "cannot tell whether the record is income or expense")
        })?;
        let business = match (record.business_id, business) {
            (Some(id), Some(None)) => return Err(CoreError::BusinessNotFound(id)),
            (_, business) => business.flatten(),
        };
        Ok(Placement { business, kind })
    }

    fn canonical_path(
        &self,
        record: &Record,
        identifier: &Identifier,
        placement: &Placement,
    ) -> Result<PathBuf, CoreError> {
        let (date, amount, category) = mandatory(record)?;
        let extension = if record.has_scan() {
            record
                .artifact
                .as_deref()
                .and_then(|path| path.extension())
                .and_then(|ext| ext.to_str())
                .unwrap_or("pdf")
                .to_lowercase()
        } else {
            self.renderer.extension().to_string()
        };
        let filename = archive_filename(
            date,
            identifier,
            category,
            record.description.as_deref(),
            amount,
            &extension,
        );
        Ok(self
            .layout
            .archive_dir(placement.business.as_ref(), placement.kind, date.year())
            .join(filename))
    }

    fn render(
        &self,
        record: &Record,
        identifier: &Identifier,
        placement: &Placement,
    ) -> Result<Vec<u8>, CoreError> {
        let request = PlaceholderRequest {
            record,
            identifier,
            kind: placement.kind,
            business_name: placement.business.as_ref().map(|b| b.name.as_str()),
        };
        self.renderer.render_placeholder(request).map_err(|err| {
            warn!(record = %record.id, identifier = %identifier, error = %err, "placeholder rendering failed");
            err
        })
    }

    /// Stores `target` as the artifact path after a successful filesystem step, or logs
    /// the failure and keeps the committed record as is.
    fn discard_companions(&self, scan: &Path) {
        for companion in self.extractor.companions(scan) {
            match fs::remove_file(&companion) {
                Ok(()) => debug!(path = %companion.display(), "companion file removed"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => warn!(
                    path = %companion.display(),
                    error = %err,
                    "companion file left in the inbox"
                ),
            }
        }
    }

    fn finish_placement(
        &self,
        committed: Record,
        target: &Path,
        placed: std::io::Result<()>,
    ) -> Record {
        let id = committed.id;
        if let Err(err) = placed {
            warn!(
                record = %id,
                target = %target.display(),
                error = %err,
                "artifact not placed; record keeps its previous artifact path"
            );
            return committed;
        }
        match self.store.update_record(id, |stored| {
            stored.artifact = Some(target.to_path_buf());
            Ok(())
        }) {
            Ok(updated) => updated,
            Err(err) => {
                error!(record = %id, target = %target.display(), error = %err, "artifact path not stored");
                committed
            }
        }
    }
}

fn no_artifact() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotFound, "record has no artifact to place")
}

fn mandatory(record: &Record) -> Result<(NaiveDate, Decimal, Category), CoreError> {
    record.mandatory_fields().ok_or_else(|| {
        let field = record.missing_fields().first().copied().unwrap_or("record");
        CoreError::validation(field, "is required for archival")
    })
}

fn validate_category(kind: Kind, category: Category) -> Result<(), CoreError> {
    if category.is_valid_for(kind) {
        Ok(())
    } else {
        Err(CoreError::validation(
            "category",
            format!("{category} is not an {kind} category"),
        ))
    }
}
