//! beleg-domain
//!
//! Pure domain models (Record, Business, RecurringDefinition, Identifier, etc.).
//! No I/O, no CLI, no storage. Only data types, core enums and calendar math.

pub mod book;
pub mod business;
pub mod common;
pub mod identifier;
pub mod kind;
pub mod record;
pub mod recurring;

pub use book::*;
pub use business::*;
pub use common::*;
pub use identifier::*;
pub use kind::*;
pub use record::*;
pub use recurring::*;
