//! Canonical archive filenames.

use beleg_domain::{Category, Identifier};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Maximum number of description characters kept in a filename.
pub const DESCRIPTION_LIMIT: usize = 30;

/// Builds `{YYMMDD}_{Identifier}_{Category}_{Description}_{Amount}.{ext}`.
///
/// The description is cut to [`DESCRIPTION_LIMIT`] characters, spaces become underscores
/// and filesystem-unsafe characters become dashes. The amount is always rendered with two
/// decimals joined by an underscore. Repeated underscores collapse into one.
pub fn archive_filename(
    date: NaiveDate,
    identifier: &Identifier,
    category: Category,
    description: Option<&str>,
    amount: Decimal,
    extension: &str,
) -> String {
    let description: String = description
        .unwrap_or_default()
        .trim()
        .chars()
        .take(DESCRIPTION_LIMIT)
        .collect();
    let description = sanitize_segment(&description.replace(' ', "_"));
    let stem = format!(
        "{}_{}_{}_{}_{}",
        date.format("%y%m%d"),
        identifier,
        sanitize_segment(category.label()),
        description.trim_matches('_'),
        format_amount(amount).replace('.', "_"),
    );
    let extension = extension.trim_start_matches('.').to_lowercase();
    format!("{}.{}", collapse_underscores(&stem), extension)
}

/// Renders `amount` with exactly two decimals.
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded.to_string()
}

fn sanitize_segment(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}

fn collapse_underscores(value: &str) -> String {
    let mut collapsed = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed
}
