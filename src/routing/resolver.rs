//! Candidate-table resolution for entity categories.

use crate::routing::EntityCategory;

/// Tables whose lowercase name contains any of the category's keywords.
///
/// Order follows `tables`. No match is an empty result, not an error.
pub fn find_candidate_tables(tables: &[String], category: EntityCategory) -> Vec<String> {
    let keywords: Vec<String> = category
        .keywords()
        .iter()
        .map(|kw| kw.to_lowercase())
        .collect();

    tables
        .iter()
        .filter(|table| {
            let lower = table.to_lowercase();
            keywords.iter().any(|kw| lower.contains(kw.as_str()))
        })
        .cloned()
        .collect()
}
