//! Permanent, sequential record identifiers such as `ARE-TB-2025001`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::kind::Kind;

/// Minimum number of digits the sequence is padded to.
pub const SEQUENCE_WIDTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
/// `{KindPrefix}[-{BusinessPrefix}]-{Year}{Sequence}`.
pub struct Identifier {
    kind: Kind,
    business_prefix: Option<String>,
    year: i32,
    sequence: u32,
}

impl Identifier {
    pub fn new(kind: Kind, business_prefix: Option<&str>, year: i32, sequence: u32) -> Self {
        Self {
            kind,
            business_prefix: business_prefix.map(str::to_string),
            year,
            sequence,
        }
    }

    /// The textual prefix shared by every identifier in a (kind, year, business) triple.
    pub fn search_prefix(kind: Kind, business_prefix: Option<&str>, year: i32) -> String {
        match business_prefix {
            Some(prefix) => format!("{}-{}-{}", kind.identifier_prefix(), prefix, year),
            None => format!("{}-{}", kind.identifier_prefix(), year),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn business_prefix(&self) -> Option<&str> {
        self.business_prefix.as_deref()
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Returns `true` when the identifier belongs to the given numbering triple.
    pub fn in_series(&self, kind: Kind, business_prefix: Option<&str>, year: i32) -> bool {
        self.kind == kind && self.year == year && self.business_prefix.as_deref() == business_prefix
    }

    pub fn parse(value: &str) -> Result<Self, IdentifierParseError> {
        let invalid = || IdentifierParseError(value.to_string());
        let mut parts: Vec<&str> = value.trim().split('-').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(invalid());
        }
        let kind = Kind::from_identifier_prefix(parts.remove(0)).ok_or_else(invalid)?;
        let tail = parts.pop().ok_or_else(invalid)?;
        let business_prefix = match parts.pop() {
            Some(prefix) if !prefix.is_empty() => Some(prefix.to_string()),
            Some(_) => return Err(invalid()),
            None => None,
        };
        if tail.len() < 4 + SEQUENCE_WIDTH || !tail.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let (year, sequence) = tail.split_at(4);
        Ok(Self {
            kind,
            business_prefix,
            year: year.parse().map_err(|_| invalid())?,
            sequence: sequence.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:0width$}",
            Identifier::search_prefix(self.kind, self.business_prefix(), self.year),
            self.sequence,
            width = SEQUENCE_WIDTH
        )
    }
}

impl FromStr for Identifier {
    type Err = IdentifierParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Identifier::parse(value)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierParseError(pub String);

impl fmt::Display for IdentifierParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed identifier `{}`", self.0)
    }
}

impl std::error::Error for IdentifierParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_and_without_business_prefix() {
        let scoped = Identifier::new(Kind::Expense, Some("TB"), 2025, 1);
        assert_eq!(scoped.to_string(), "ARE-TB-2025001");
        let unscoped = Identifier::new(Kind::Income, None, 2024, 42);
        assert_eq!(unscoped.to_string(), "ERE-2024042");
        let wide = Identifier::new(Kind::Expense, Some("MK"), 2025, 1234);
        assert_eq!(wide.to_string(), "ARE-MK-20251234");
    }

    #[test]
    fn parses_formatted_identifiers() {
        let parsed = Identifier::parse("ERE-MK-2025017").expect("parse identifier");
        assert_eq!(parsed.kind(), Kind::Income);
        assert_eq!(parsed.business_prefix(), Some("MK"));
        assert_eq!(parsed.year(), 2025);
        assert_eq!(parsed.sequence(), 17);

        let wide = Identifier::parse("ARE-MK-20251234").expect("parse wide");
        assert_eq!(wide.sequence(), 1234);
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for value in ["", "ARE", "XYZ-2025001", "ARE-TB-25001", "ARE--2025001", "ARE-TB-2025abc"] {
            assert!(Identifier::parse(value).is_err(), "{value} should be rejected");
        }
    }

    #[test]
    fn series_membership_is_exact() {
        let id = Identifier::new(Kind::Expense, Some("TB"), 2025, 3);
        assert!(id.in_series(Kind::Expense, Some("TB"), 2025));
        assert!(!id.in_series(Kind::Expense, None, 2025));
        assert!(!id.in_series(Kind::Income, Some("TB"), 2025));
        assert!(!id.in_series(Kind::Expense, Some("TB"), 2024));
    }
}
