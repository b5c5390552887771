//! Recurring booking templates and their occurrence schedule.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::*,
    kind::{Category, Kind, UnknownLabel},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub fn months(self) -> i32 {
        match self {
            Frequency::Monthly => 1,
            Frequency::Quarterly => 3,
            Frequency::Yearly => 12,
        }
    }

    /// Advances `from` by one calendar step of this frequency.
    pub fn step(self, from: NaiveDate) -> NaiveDate {
        shift_month(from, self.months())
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        };
        f.write_str(label)
    }
}

impl FromStr for Frequency {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "yearly" => Ok(Frequency::Yearly),
            _ => Err(UnknownLabel {
                what: "frequency",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Template that spawns one record per due occurrence.
pub struct RecurringDefinition {
    pub id: Uuid,
    pub business_id: Option<Uuid>,
    pub kind: Kind,
    pub amount: Decimal,
    pub category: Category,
    pub description: String,
    pub frequency: Frequency,
    /// Target day of month. Defaults to the start date's day when unset.
    #[serde(default)]
    pub day_of_month: Option<u32>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "RecurringDefinition::default_active")]
    pub active: bool,
    /// Date of the last occurrence processed by the generator.
    #[serde(default)]
    pub last_generated: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Result of walking a definition's schedule up to a reference date.
pub struct DueOccurrences {
    pub dates: Vec<NaiveDate>,
    /// The iteration cap stopped the walk before it reached the reference date.
    pub truncated: bool,
}

impl RecurringDefinition {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        business_id: Option<Uuid>,
        kind: Kind,
        amount: Decimal,
        category: Category,
        description: impl Into<String>,
        frequency: Frequency,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_id,
            kind,
            amount,
            category,
            description: description.into(),
            frequency,
            day_of_month: None,
            start_date,
            end_date: None,
            active: true,
            last_generated: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_day_of_month(mut self, day: u32) -> Self {
        self.day_of_month = Some(day);
        self
    }

    pub fn with_end_date(mut self, end: NaiveDate) -> Self {
        self.end_date = Some(end);
        self
    }

    pub fn default_active() -> bool {
        true
    }

    pub fn target_day(&self) -> u32 {
        self.day_of_month.unwrap_or_else(|| self.start_date.day())
    }

    /// First occurrence on or after the start date.
    pub fn first_occurrence(&self) -> NaiveDate {
        let first = with_day_clamped(self.start_date, self.target_day());
        if first < self.start_date {
            self.next_occurrence(first)
        } else {
            first
        }
    }

    /// Occurrence one frequency step after `previous`, pinned to the target day.
    pub fn next_occurrence(&self, previous: NaiveDate) -> NaiveDate {
        with_day_clamped(self.frequency.step(previous), self.target_day())
    }

    /// Walks the schedule from the checkpoint (exclusive) or the first occurrence and
    /// collects every date that is due by `today` and not past the end date.
    pub fn due_occurrences(&self, today: NaiveDate, cap: usize) -> DueOccurrences {
        let mut due = DueOccurrences::default();
        let mut candidate = match self.last_generated {
            Some(checkpoint) => self.next_occurrence(checkpoint),
            None => self.first_occurrence(),
        };
        loop {
            if candidate > today || self.end_date.is_some_and(|end| candidate > end) {
                break;
            }
            if due.dates.len() >= cap {
                due.truncated = true;
                break;
            }
            due.dates.push(candidate);
            let next = self.next_occurrence(candidate);
            if next <= candidate {
                due.truncated = true;
                break;
            }
            candidate = next;
        }
        due
    }

    /// Moves the checkpoint forward; never moves it backwards.
    pub fn advance_checkpoint(&mut self, processed: NaiveDate) -> bool {
        if self.last_generated.is_some_and(|current| current >= processed) {
            return false;
        }
        self.last_generated = Some(processed);
        true
    }
}

impl Identifiable for RecurringDefinition {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Displayable for RecurringDefinition {
    fn display_label(&self) -> String {
        format!("{} {} ({})", self.frequency, self.description, self.kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Partial update of a [`RecurringDefinition`]. The checkpoint is not patchable.
pub struct RecurringPatch {
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub category: Option<Category>,
    pub frequency: Option<Frequency>,
    pub day_of_month: Option<Option<u32>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
    pub active: Option<bool>,
}

impl RecurringPatch {
    pub fn apply_to(&self, definition: &mut RecurringDefinition) {
        if let Some(description) = &self.description {
            definition.description = description.clone();
        }
        if let Some(amount) = self.amount {
            definition.amount = amount;
        }
        if let Some(category) = self.category {
            definition.category = category;
        }
        if let Some(frequency) = self.frequency {
            definition.frequency = frequency;
        }
        if let Some(day) = self.day_of_month {
            definition.day_of_month = day;
        }
        if let Some(start) = self.start_date {
            definition.start_date = start;
        }
        if let Some(end) = self.end_date {
            definition.end_date = end;
        }
        if let Some(active) = self.active {
            definition.active = active;
        }
    }
}
