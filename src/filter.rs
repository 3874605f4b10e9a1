//! Filter/search evaluation
//!
//! Recomputes the visible subset of the dataset as indices into the full
//! record slice, preserving original relative order. Predicate order is
//! cheapest-rejection first: search term, then type, status, category, with a
//! per-record short circuit.

use crate::models::{FilterCriteria, TransactionRecord};

/// Indices of records matching the criteria, in original order. `limit`
/// stops evaluation early once that many matches are found (compact view).
pub fn evaluate(
    records: &[TransactionRecord],
    criteria: &FilterCriteria,
    limit: Option<usize>,
) -> Vec<usize> {
    if criteria.is_unfiltered() {
        let cap = limit.unwrap_or(records.len()).min(records.len());
        return (0..cap).collect();
    }

    let term = criteria.search.trim().to_lowercase();
    let mut matches = Vec::new();

    for (index, record) in records.iter().enumerate() {
        if let Some(cap) = limit {
            if matches.len() >= cap {
                break;
            }
        }

        if !term.is_empty() && !matches_search(record, &term) {
            continue;
        }
        if let Some(tx_type) = criteria.tx_type {
            if record.tx_type != tx_type {
                continue;
            }
        }
        if let Some(status) = criteria.status {
            if record.status != status {
                continue;
            }
        }
        if let Some(category) = &criteria.category {
            if !category.is_empty() && record.category != *category {
                continue;
            }
        }

        matches.push(index);
    }

    matches
}

/// Case-insensitive substring match over description, merchant, category,
/// identifier, and the string form of the amount.
fn matches_search(record: &TransactionRecord, term: &str) -> bool {
    record.description.to_lowercase().contains(term)
        || record.merchant.to_lowercase().contains(term)
        || record.category.to_lowercase().contains(term)
        || record.id.to_lowercase().contains(term)
        || record.amount.to_string().contains(term)
}

/// Sorted unique category list across the dataset, for the category filter
/// dropdown.
pub fn categories(records: &[TransactionRecord]) -> Vec<String> {
    let mut categories: Vec<String> = records.iter().map(|r| r.category.clone()).collect();
    categories.sort_unstable();
    categories.dedup();
    categories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TransactionStatus, TransactionType};
    use chrono::Utc;

    fn record(id: &str, merchant: &str, category: &str, amount: f64) -> TransactionRecord {
        TransactionRecord {
            id: id.to_string(),
            timestamp: Utc::now(),
            amount,
            currency: "USD".to_string(),
            tx_type: TransactionType::Debit,
            category: category.to_string(),
            description: format!("Payment to {merchant}"),
            merchant: merchant.to_string(),
            status: TransactionStatus::Completed,
            user_id: "user-1".to_string(),
            account_id: "acct-1".to_string(),
            location: None,
            reference: None,
        }
    }

    fn dataset() -> Vec<TransactionRecord> {
        vec![
            record("txn-a", "Amazon", "Shopping", 120.5),
            record("txn-b", "Starbucks", "Dining", 8.75),
            record("txn-c", "Amazon", "Shopping", 1450.0),
            record("txn-d", "Shell", "Transport", 52.3),
        ]
    }

    #[test]
    fn test_empty_criteria_matches_everything_in_order() {
        let records = dataset();
        let indices = evaluate(&records, &FilterCriteria::default(), None);
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let records = dataset();
        let criteria = FilterCriteria {
            search: "AMAZON".to_string(),
            ..Default::default()
        };
        assert_eq!(evaluate(&records, &criteria, None), vec![0, 2]);

        // Identifier and amount string are searchable too
        let criteria = FilterCriteria {
            search: "txn-d".to_string(),
            ..Default::default()
        };
        assert_eq!(evaluate(&records, &criteria, None), vec![3]);

        let criteria = FilterCriteria {
            search: "8.75".to_string(),
            ..Default::default()
        };
        assert_eq!(evaluate(&records, &criteria, None), vec![1]);
    }

    #[test]
    fn test_unfiltered_fast_path_matches_full_evaluation() {
        let records = dataset();
        let unfiltered = FilterCriteria::default();
        assert!(unfiltered.is_unfiltered());
        assert_eq!(evaluate(&records, &unfiltered, None), vec![0, 1, 2, 3]);
        assert_eq!(evaluate(&records, &unfiltered, Some(3)), vec![0, 1, 2]);
        assert_eq!(evaluate(&records, &unfiltered, Some(100)), vec![0, 1, 2, 3]);

        // Whitespace-only search is not the fast path but matches everything
        // once trimmed.
        let blank = FilterCriteria {
            search: "   ".to_string(),
            ..Default::default()
        };
        assert!(!blank.is_unfiltered());
        assert_eq!(evaluate(&records, &blank, None), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_combined_predicates_short_circuit() {
        let mut records = dataset();
        records[1].status = TransactionStatus::Pending;
        let criteria = FilterCriteria {
            tx_type: Some(TransactionType::Debit),
            status: Some(TransactionStatus::Completed),
            category: Some("Shopping".to_string()),
            search: "amazon".to_string(),
        };
        assert_eq!(evaluate(&records, &criteria, None), vec![0, 2]);
    }

    #[test]
    fn test_compact_view_caps_results() {
        let records = dataset();
        let indices = evaluate(&records, &FilterCriteria::default(), Some(2));
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_idempotent_and_stable_under_unrelated_growth() {
        let mut records = dataset();
        let criteria = FilterCriteria {
            category: Some("Shopping".to_string()),
            ..Default::default()
        };

        let first = evaluate(&records, &criteria, None);
        let second = evaluate(&records, &criteria, None);
        assert_eq!(first, second);

        // Appending non-matching records never disturbs existing matches
        records.push(record("txn-e", "Delta Airlines", "Travel", 640.0));
        let grown = evaluate(&records, &criteria, None);
        assert_eq!(grown, first);
    }

    #[test]
    fn test_derived_category_list() {
        let records = dataset();
        assert_eq!(categories(&records), vec!["Dining", "Shopping", "Transport"]);
    }
}
