//! Accounting entities that own their own folders and identifier sequences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

pub const DEFAULT_BUSINESS_COLOR: &str = "#007AFF";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    /// Short code embedded in identifiers, e.g. `TB` in `ARE-TB-2025001`.
    pub prefix: String,
    #[serde(default = "Business::default_color")]
    pub color: String,
    /// Directory below the inbox and archive roots, fixed when the business is created.
    /// Ledgers written before it existed derive it from the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Business {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            prefix: prefix.into(),
            color: Self::default_color(),
            folder: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn default_color() -> String {
        DEFAULT_BUSINESS_COLOR.into()
    }
}

impl Identifiable for Business {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Business {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Displayable for Business {
    fn display_label(&self) -> String {
        format!("{} [{}]", self.name, self.prefix)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Partial update applied to a [`Business`].
pub struct BusinessPatch {
    pub name: Option<String>,
    pub prefix: Option<String>,
    pub color: Option<String>,
}

impl BusinessPatch {
    pub fn apply_to(&self, business: &mut Business) {
        if let Some(name) = &self.name {
            business.name = name.clone();
        }
        if let Some(prefix) = &self.prefix {
            business.prefix = prefix.clone();
        }
        if let Some(color) = &self.color {
            business.color = color.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How records and recurring definitions of a deleted business are handled.
pub enum DependentResolution {
    /// Refuse deletion while dependents exist.
    Block,
    /// Delete every dependent record and definition together with the business.
    Cascade,
    /// Move every dependent to another business.
    ReassignTo(Uuid),
}
