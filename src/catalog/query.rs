//! Keyword and producer filtering over an already built index.
//! Results keep index order; there is no relevance ranking.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::catalog::record::CatalogEntry;

/// Producer filter value that disables producer filtering.
pub const ALL_PRODUCERS: &str = "All";

/// Entries matching both the producer filter and the keyword, in input order.
///
/// `producer_filter` is an exact match unless it is empty or [`ALL_PRODUCERS`]. The keyword
/// is matched case-insensitively as a substring of any top-level string field of the entry,
/// exactly as given (callers trim user input); an empty keyword matches everything.
pub fn search<'a>(
    entries: &'a [CatalogEntry],
    keyword: &str,
    producer_filter: &str,
) -> Vec<&'a CatalogEntry> {
    let needle = keyword.to_lowercase();
    let producer_filter = producer_filter.trim();
    let filter_producer = !producer_filter.is_empty() && producer_filter != ALL_PRODUCERS;

    entries
        .iter()
        .filter(|entry| !filter_producer || entry.producer == producer_filter)
        .filter(|entry| needle.is_empty() || matches_keyword(entry, &needle))
        .collect()
}

fn matches_keyword(entry: &CatalogEntry, needle: &str) -> bool {
    let record = &entry.record;
    let location = entry.location.to_string();
    let fixed = [
        record.table_name.as_str(),
        record.producer.as_str(),
        record.title.as_str(),
        record.description.as_str(),
        record.last_updated.as_str(),
        entry.producer.as_str(),
        location.as_str(),
    ];

    fixed.into_iter().any(|field| contains(field, needle))
        || record.custom_fields.values().any(|v| contains(v, needle))
        || record
            .extra
            .values()
            .filter_map(Value::as_str)
            .any(|v| contains(v, needle))
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// `All` followed by the sorted distinct producers of the index.
pub fn producer_choices(entries: &[CatalogEntry]) -> Vec<String> {
    let producers: BTreeSet<&str> = entries.iter().map(|e| e.producer.as_str()).collect();
    std::iter::once(ALL_PRODUCERS.to_string())
        .chain(producers.into_iter().map(str::to_string))
        .collect()
}

pub fn find_entry<'a>(
    entries: &'a [CatalogEntry],
    producer: &str,
    table_name: &str,
) -> Option<&'a CatalogEntry> {
    entries
        .iter()
        .find(|entry| entry.producer == producer && entry.table_name() == table_name)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::catalog::demo::demo_entries;
    use crate::catalog::record::{MetadataRecord, SourceLocation};

    #[test]
    fn empty_keyword_and_all_is_identity() {
        let entries = demo_entries();
        let results = search(&entries, "", ALL_PRODUCERS);
        assert_eq!(results.len(), entries.len());
        assert!(results.iter().zip(&entries).all(|(a, b)| *a == b));
    }

    #[rstest]
    #[case("climat", 1)]
    #[case("CLIMAT", 1)]
    #[case("insee", 1)]
    #[case("licence ouverte", 1)]
    #[case("demo", 5)]
    #[case("no such dataset", 0)]
    fn keyword_scans_every_string_field(#[case] keyword: &str, #[case] expected: usize) {
        let entries = demo_entries();
        assert_eq!(search(&entries, keyword, ALL_PRODUCERS).len(), expected);
    }

    #[test]
    fn keyword_whitespace_is_significant() {
        let record: MetadataRecord = serde_json::from_value(serde_json::json!({
            "table_name": "x2016",
            "producer": "P",
            "title": "x2016",
        }))
        .expect("record");
        let entries = vec![CatalogEntry {
            producer: record.producer.clone(),
            record,
            location: SourceLocation::Demo,
            modified: None,
        }];
        assert_eq!(search(&entries, "2016", ALL_PRODUCERS).len(), 1);
        assert!(search(&entries, " 2016", ALL_PRODUCERS).is_empty());
        assert!(search(&entries, " ", ALL_PRODUCERS).is_empty());
    }

    #[test]
    fn producer_filter_is_exact_and_conjunctive() {
        let entries = demo_entries();
        let results = search(&entries, "", "INSEE");
        assert_eq!(results.len(), 1);
        assert!(results.iter().all(|e| e.producer == "INSEE"));

        assert!(search(&entries, "climat", "INSEE").is_empty());
        assert!(search(&entries, "", "insee").is_empty());
    }

    #[test]
    fn producer_choices_start_with_all() {
        let choices = producer_choices(&demo_entries());
        assert_eq!(choices[0], ALL_PRODUCERS);
        assert_eq!(choices.len(), 6);
        let rest = &choices[1..];
        assert!(rest.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn finds_entry_by_natural_key() {
        let entries = demo_entries();
        let entry = find_entry(&entries, "Cerema", "comptages_routiers_2023").expect("entry");
        assert_eq!(entry.display_title(), "Comptages routiers 2023");
        assert!(find_entry(&entries, "INSEE", "comptages_routiers_2023").is_none());
    }
}
