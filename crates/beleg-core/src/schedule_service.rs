//! Materializes due occurrences of recurring definitions.

use std::sync::Arc;

use beleg_domain::{Record, RecurringDefinition};
use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    storage::{LedgerStoreExt, OccurrenceInsert},
    CoreError, LedgerStore,
};

pub const DEFAULT_ITERATION_CAP: usize = 1000;

pub struct ScheduleService {
    store: Arc<dyn LedgerStore>,
    iteration_cap: usize,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_iteration_cap(store, DEFAULT_ITERATION_CAP)
    }

    pub fn with_iteration_cap(store: Arc<dyn LedgerStore>, iteration_cap: usize) -> Self {
        Self {
            store,
            iteration_cap: iteration_cap.max(1),
        }
    }

    /// Runs [`generate_due`](Self::generate_due) over every stored definition.
    pub fn generate_all(&self, today: NaiveDate) -> Result<Vec<Uuid>, CoreError> {
        let definitions = self.store.definitions()?;
        Ok(self.generate_due(&definitions, today))
    }

    /// Creates one record per due `(definition, date)` pair that does not exist yet and
    /// returns the ids of the new records. Failures are logged per definition and never
    /// abort the remaining ones; records inserted before a failure are still reported.
    ///
    /// `definitions` may be out of date. Each insert is checked against the stored
    /// definition, so a deleted or paused definition yields nothing.
    pub fn generate_due(&self, definitions: &[RecurringDefinition], today: NaiveDate) -> Vec<Uuid> {
        let mut created = Vec::new();
        for definition in definitions.iter().filter(|definition| definition.active) {
            if let Err(err) = self.generate_definition(definition, today, &mut created) {
                warn!(
                    definition = %definition.id,
                    error = %err,
                    "recurring generation failed"
                );
            }
        }
        created
    }

    fn generate_definition(
        &self,
        definition: &RecurringDefinition,
        today: NaiveDate,
        created: &mut Vec<Uuid>,
    ) -> Result<(), CoreError> {
        let due = definition.due_occurrences(today, self.iteration_cap);
        if due.truncated {
            warn!(
                definition = %definition.id,
                cap = self.iteration_cap,
                "iteration cap reached; remaining occurrences follow on the next pass"
            );
        }
        for date in &due.dates {
            let record = Record::scheduled(
                definition.business_id,
                definition.id,
                *date,
                definition.amount,
                definition.category,
                definition.description.clone(),
            );
            let id = record.id;
            match self.store.insert_occurrence(record)? {
                OccurrenceInsert::Inserted => {
                    info!(definition = %definition.id, %date, record = %id, "occurrence materialized");
                    created.push(id);
                }
                OccurrenceInsert::Present => {
                    debug!(definition = %definition.id, %date, "occurrence already present");
                }
                OccurrenceInsert::Retired => {
                    debug!(definition = %definition.id, "definition deleted or paused; pass skipped");
                    return Ok(());
                }
            }
        }
        if let Some(last) = due.dates.last() {
            self.store.advance_checkpoint(definition.id, *last)?;
        }
        Ok(())
    }
}
