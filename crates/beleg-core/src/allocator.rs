//! Sequential identifier allocation.

use std::sync::Arc;

use beleg_domain::{Identifier, Kind};
use tracing::{debug, info};

use crate::{storage::LedgerStoreExt, CoreError, LedgerStore};

pub const DEFAULT_RETRY_LIMIT: u32 = 128;

/// Hands out `{Kind}[-{Business}]-{Year}{Seq}` identifiers without a global lock.
///
/// Proposes `max + 1` for the series and claims it atomically in the store. A collision
/// means another caller won the race; the candidate is bumped and claimed again, up to
/// the retry limit. A claimed identifier is never released, so a later pipeline failure
/// leaves a gap in the sequence but never a duplicate.
#[derive(Clone)]
pub struct IdAllocator {
    store: Arc<dyn LedgerStore>,
    retry_limit: u32,
}

impl IdAllocator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_retry_limit(store, DEFAULT_RETRY_LIMIT)
    }

    pub fn with_retry_limit(store: Arc<dyn LedgerStore>, retry_limit: u32) -> Self {
        Self {
            store,
            retry_limit: retry_limit.max(1),
        }
    }

    pub fn allocate(
        &self,
        kind: Kind,
        year: i32,
        business_prefix: Option<&str>,
    ) -> Result<Identifier, CoreError> {
        let observed = self.store.max_sequence(kind, business_prefix, year)?;
        let mut candidate = observed.checked_add(1);
        for attempt in 1..=self.retry_limit {
            let Some(sequence) = candidate else {
                return Err(self.exhausted(kind, business_prefix, year, attempt - 1));
            };
            let identifier = Identifier::new(kind, business_prefix, year, sequence);
            if self.store.claim_identifier(&identifier)? {
                info!(identifier = %identifier, attempt, "identifier allocated");
                return Ok(identifier);
            }
            debug!(identifier = %identifier, attempt, "identifier taken, retrying");
            candidate = sequence.checked_add(1);
        }
        Err(self.exhausted(kind, business_prefix, year, self.retry_limit))
    }

    fn exhausted(
        &self,
        kind: Kind,
        business_prefix: Option<&str>,
        year: i32,
        attempts: u32,
    ) -> CoreError {
        CoreError::IdentifierExhausted {
            prefix: Identifier::search_prefix(kind, business_prefix, year),
            attempts,
        }
    }
}
