use std::collections::BTreeMap;

use beleg_domain::{Category, Kind, LedgerBook, LifecycleState};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Totals {
    pub income: Decimal,
    pub expenses: Decimal,
}

impl Totals {
    pub fn profit(&self) -> Decimal {
        self.income - self.expenses
    }

    fn add(&mut self, kind: Kind, amount: Decimal) {
        match kind {
            Kind::Income => self.income += amount,
            Kind::Expense => self.expenses += amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotal {
    pub kind: Kind,
    pub category: Category,
    pub total: Decimal,
}

/// Figures for one year, optionally narrowed to a business. Only archived records count
/// towards the totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub year: i32,
    pub business_id: Option<Uuid>,
    pub year_totals: Totals,
    pub month_totals: Totals,
    pub pending_reviews: usize,
    pub by_category: Vec<CategoryTotal>,
}

pub struct SummaryService;

impl SummaryService {
    /// `today` selects the current month; `year` the reporting year.
    pub fn dashboard(
        book: &LedgerBook,
        business_id: Option<Uuid>,
        year: i32,
        today: NaiveDate,
    ) -> Dashboard {
        let mut year_totals = Totals::default();
        let mut month_totals = Totals::default();
        let mut categories: BTreeMap<(Kind, Category), Decimal> = BTreeMap::new();
        let mut pending_reviews = 0;

        let in_scope = book
            .records
            .iter()
            .filter(|record| business_id.map_or(true, |id| record.business_id == Some(id)));
        for record in in_scope {
            if matches!(
                record.state(),
                LifecycleState::Ingested | LifecycleState::Extracted
            ) {
                pending_reviews += 1;
                continue;
            }
            if record.state() != LifecycleState::Archived {
                continue;
            }
            let (Some(kind), Some((date, amount, category))) =
                (book.kind_of(record), record.mandatory_fields())
            else {
                continue;
            };
            if date.year() != year {
                continue;
            }
            year_totals.add(kind, amount);
            if date.month() == today.month() && date.year() == today.year() {
                month_totals.add(kind, amount);
            }
            *categories.entry((kind, category)).or_default() += amount;
        }

        Dashboard {
            year,
            business_id,
            year_totals,
            month_totals,
            pending_reviews,
            by_category: categories
                .into_iter()
                .map(|((kind, category), total)| CategoryTotal {
                    kind,
                    category,
                    total,
                })
                .collect(),
        }
    }
}
