//! Business management with uniqueness and dependent-safety rules.

use std::sync::Arc;

use beleg_domain::{Business, BusinessPatch, DependentResolution, LedgerBook};
use chrono::Datelike;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    layout::business_folder, storage::LedgerStoreExt, ArchiveLayout, Clock, CoreError,
    LedgerStore,
};

/// Result of a successful business deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessRemoval {
    pub business: Business,
    pub records_deleted: usize,
    pub definitions_deleted: usize,
    pub reassigned_to: Option<Uuid>,
}

pub struct BusinessService {
    store: Arc<dyn LedgerStore>,
    layout: ArchiveLayout,
    clock: Arc<dyn Clock>,
}

impl BusinessService {
    pub fn new(store: Arc<dyn LedgerStore>, layout: ArchiveLayout, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            layout,
            clock,
        }
    }

    pub fn list(&self) -> Result<Vec<Business>, CoreError> {
        let mut businesses = self.store.businesses()?;
        businesses.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(businesses)
    }

    pub fn get(&self, id: Uuid) -> Result<Business, CoreError> {
        self.store.business(id)
    }

    /// Looks a business up by prefix or name, case-insensitively.
    pub fn find(&self, key: &str) -> Result<Option<Business>, CoreError> {
        self.store.query(|book| {
            book.business_by_prefix(key)
                .or_else(|| book.business_by_name(key))
                .cloned()
        })
    }

    /// Adds a business and provisions its inbox and archive folders.
    pub fn create(
        &self,
        name: &str,
        prefix: &str,
        color: Option<&str>,
    ) -> Result<Business, CoreError> {
        let name = normalize_name(name)?;
        let prefix = normalize_prefix(prefix)?;
        let mut business = Business::new(name, prefix);
        if let Some(color) = color.map(str::trim).filter(|c| !c.is_empty()) {
            business = business.with_color(color);
        }
        let created = self.store.mutate(move |book| {
            ensure_unique(book, &business, None)?;
            business.folder = Some(free_folder(book, &business));
            book.businesses.push(business.clone());
            Ok(business)
        })?;
        info!(business = %created.id, name = %created.name, prefix = %created.prefix, "business created");
        self.provision(&created);
        Ok(created)
    }

    pub fn update(&self, id: Uuid, patch: &BusinessPatch) -> Result<Business, CoreError> {
        let patch = BusinessPatch {
            name: patch.name.as_deref().map(normalize_name).transpose()?,
            prefix: patch.prefix.as_deref().map(normalize_prefix).transpose()?,
            color: patch.color.clone(),
        };
        let updated = self.store.mutate(|book| {
            let mut candidate = book.business(id).cloned().ok_or(CoreError::BusinessNotFound(id))?;
            // Keep the folders the business already has on disk.
            candidate.folder = Some(business_folder(&candidate));
            patch.apply_to(&mut candidate);
            ensure_unique(book, &candidate, Some(id))?;
            if let Some(stored) = book.business_mut(id) {
                *stored = candidate.clone();
            }
            Ok(candidate)
        })?;
        info!(business = %id, name = %updated.name, prefix = %updated.prefix, "business updated");
        self.provision(&updated);
        Ok(updated)
    }

    /// Deletes a business. Dependent records and recurring definitions block the deletion
    /// unless `resolution` cascades or reassigns them.
    pub fn delete(
        &self,
        id: Uuid,
        resolution: DependentResolution,
    ) -> Result<BusinessRemoval, CoreError> {
        let removal = self.store.mutate(|book| {
            let business = book.business(id).cloned().ok_or(CoreError::BusinessNotFound(id))?;
            let (records, definitions) = book.dependents_of(id);
            let mut removal = BusinessRemoval {
                business: business.clone(),
                records_deleted: 0,
                definitions_deleted: 0,
                reassigned_to: None,
            };
            match resolution {
                DependentResolution::Block if records + definitions > 0 => {
                    return Err(CoreError::BusinessHasDependents {
                        business: business.name,
                        records,
                        definitions,
                    });
                }
                DependentResolution::Block => {}
                DependentResolution::Cascade => {
                    book.records.retain(|record| record.business_id != Some(id));
                    book.definitions
                        .retain(|definition| definition.business_id != Some(id));
                    removal.records_deleted = records;
                    removal.definitions_deleted = definitions;
                }
                DependentResolution::ReassignTo(target) => {
                    if target == id {
                        return Err(CoreError::validation(
                            "reassign_to",
                            "cannot reassign to the business being deleted",
                        ));
                    }
                    if book.business(target).is_none() {
                        return Err(CoreError::BusinessNotFound(target));
                    }
                    for record in book.records.iter_mut().filter(|r| r.business_id == Some(id)) {
                        record.business_id = Some(target);
                        record.touch();
                    }
                    for definition in book
                        .definitions
                        .iter_mut()
                        .filter(|d| d.business_id == Some(id))
                    {
                        definition.business_id = Some(target);
                    }
                    removal.reassigned_to = Some(target);
                }
            }
            book.businesses.retain(|business| business.id != id);
            Ok(removal)
        })?;

        if resolution == DependentResolution::Cascade {
            if let Err(err) = self.layout.remove_business_folders(&removal.business) {
                warn!(business = %id, error = %err, "business folders not removed");
            }
        }
        info!(
            business = %id,
            records_deleted = removal.records_deleted,
            definitions_deleted = removal.definitions_deleted,
            "business deleted"
        );
        Ok(removal)
    }

    fn provision(&self, business: &Business) {
        let year = self.clock.today().year();
        if let Err(err) = self.layout.provision(business, year) {
            warn!(business = %business.id, error = %err, "business folders not provisioned");
        }
    }
}

fn normalize_name(name: &str) -> Result<String, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::validation("name", "must not be empty"));
    }
    Ok(name.to_string())
}

fn normalize_prefix(prefix: &str) -> Result<String, CoreError> {
    let prefix = prefix.trim().to_uppercase();
    if prefix.is_empty() {
        return Err(CoreError::validation("prefix", "must not be empty"));
    }
    if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CoreError::validation(
            "prefix",
            format!("`{prefix}` may only contain letters and digits"),
        ));
    }
    Ok(prefix)
}

/// The name-derived folder, or `{name} ({prefix})` when another business already uses it.
fn free_folder(book: &LedgerBook, business: &Business) -> String {
    let folder = business_folder(business);
    let taken = book.businesses.iter().any(|other| {
        other.id != business.id && business_folder(other).eq_ignore_ascii_case(&folder)
    });
    if taken {
        format!("{folder} ({})", business.prefix)
    } else {
        folder
    }
}

fn ensure_unique(
    book: &LedgerBook,
    candidate: &Business,
    ignore: Option<Uuid>,
) -> Result<(), CoreError> {
    let others = || {
        book.businesses
            .iter()
            .filter(move |business| Some(business.id) != ignore)
    };
    if others().any(|b| b.name.eq_ignore_ascii_case(&candidate.name)) {
        return Err(CoreError::DuplicateBusiness {
            field: "name",
            value: candidate.name.clone(),
        });
    }
    if others().any(|b| b.prefix.eq_ignore_ascii_case(&candidate.prefix)) {
        return Err(CoreError::DuplicateBusiness {
            field: "prefix",
            value: candidate.prefix.clone(),
        });
    }
    Ok(())
}
