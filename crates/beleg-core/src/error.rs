use std::io;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Collaborator failed: {0}")]
    Collaborator(String),
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("A business with {field} `{value}` already exists")]
    DuplicateBusiness { field: &'static str, value: String },
    #[error(
        "Business `{business}` still has {records} record(s) and {definitions} recurring \
         definition(s); delete with cascade or reassign them to another business"
    )]
    BusinessHasDependents {
        business: String,
        records: usize,
        definitions: usize,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Record not found: {0}")]
    RecordNotFound(Uuid),
    #[error("Business not found: {0}")]
    BusinessNotFound(Uuid),
    #[error("Recurring definition not found: {0}")]
    DefinitionNotFound(Uuid),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("No free identifier under `{prefix}` after {attempts} attempts")]
    IdentifierExhausted { prefix: String, attempts: u32 },
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field,
            message: message.into(),
        }
    }
}
