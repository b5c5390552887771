//! Record kinds and the fixed category vocabulary attached to each kind.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Distinguishes outgoing receipts from issued invoices.
pub enum Kind {
    Expense,
    Income,
}

impl Kind {
    pub const ALL: [Kind; 2] = [Kind::Expense, Kind::Income];

    /// Three-letter code that opens every identifier of this kind.
    pub fn identifier_prefix(self) -> &'static str {
        match self {
            Kind::Expense => "ARE",
            Kind::Income => "ERE",
        }
    }

    /// Directory segment used for this kind below inbox and archive roots.
    pub fn folder_name(self) -> &'static str {
        match self {
            Kind::Expense => "Ausgaben",
            Kind::Income => "Einnahmen",
        }
    }

    pub fn from_identifier_prefix(value: &str) -> Option<Kind> {
        Kind::ALL
            .into_iter()
            .find(|kind| kind.identifier_prefix() == value)
    }

    pub fn from_folder_name(value: &str) -> Option<Kind> {
        Kind::ALL.into_iter().find(|kind| kind.folder_name() == value)
    }

    /// Categories a record of this kind may carry.
    pub fn categories(self) -> &'static [Category] {
        match self {
            Kind::Expense => &EXPENSE_CATEGORIES,
            Kind::Income => &INCOME_CATEGORIES,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Kind::Expense => "expense",
            Kind::Income => "income",
        };
        f.write_str(label)
    }
}

impl FromStr for Kind {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "expense" | "ausgabe" | "ausgaben" | "are" => Ok(Kind::Expense),
            "income" | "einnahme" | "einnahmen" | "ere" => Ok(Kind::Income),
            _ => Err(UnknownLabel::new("kind", value)),
        }
    }
}

const EXPENSE_CATEGORIES: [Category; 9] = [
    Category::Buero,
    Category::Raum,
    Category::Telefon,
    Category::Fahrtkosten,
    Category::Fortbildung,
    Category::Versicherung,
    Category::Porto,
    Category::Werbung,
    Category::Sonstiges,
];

const INCOME_CATEGORIES: [Category; 6] = [
    Category::Honorar,
    Category::Lizenzgebuehren,
    Category::Workshops,
    Category::Stipendien,
    Category::Verkaeufe,
    Category::Sonstiges,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Tax-relevant booking categories.
pub enum Category {
    #[serde(rename = "Büro")]
    Buero,
    Raum,
    Telefon,
    Fahrtkosten,
    Fortbildung,
    Versicherung,
    Porto,
    Werbung,
    Honorar,
    #[serde(rename = "Lizenzgebühren")]
    Lizenzgebuehren,
    Workshops,
    Stipendien,
    #[serde(rename = "Verkäufe")]
    Verkaeufe,
    Sonstiges,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Buero => "Büro",
            Category::Raum => "Raum",
            Category::Telefon => "Telefon",
            Category::Fahrtkosten => "Fahrtkosten",
            Category::Fortbildung => "Fortbildung",
            Category::Versicherung => "Versicherung",
            Category::Porto => "Porto",
            Category::Werbung => "Werbung",
            Category::Honorar => "Honorar",
            Category::Lizenzgebuehren => "Lizenzgebühren",
            Category::Workshops => "Workshops",
            Category::Stipendien => "Stipendien",
            Category::Verkaeufe => "Verkäufe",
            Category::Sonstiges => "Sonstiges",
        }
    }

    /// Returns `true` when the category belongs to the vocabulary of `kind`.
    pub fn is_valid_for(self, kind: Kind) -> bool {
        kind.categories().contains(&self)
    }

    /// Accepts the display label in any case, plus the ASCII transliteration of umlauts.
    pub fn parse(value: &str) -> Option<Category> {
        let wanted = normalize_label(value);
        Kind::ALL
            .into_iter()
            .flat_map(|kind| kind.categories().iter().copied())
            .find(|category| normalize_label(category.label()) == wanted)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Category::parse(value).ok_or_else(|| UnknownLabel::new("category", value))
    }
}

fn normalize_label(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .replace('ä', "ae")
        .replace('ö', "oe")
        .replace('ü', "ue")
        .replace('ß', "ss")
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Raised when a textual label does not name a known variant.
pub struct UnknownLabel {
    pub what: &'static str,
    pub value: String,
}

impl UnknownLabel {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} `{}`", self.what, self.value)
    }
}

impl std::error::Error for UnknownLabel {}
