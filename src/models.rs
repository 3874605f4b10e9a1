use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Transaction direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Debit,
    Credit,
}

impl TransactionType {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionType::Debit => "debit",
            TransactionType::Credit => "credit",
        }
    }
}

/// Settlement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

/// A single transaction record. Immutable once generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
    pub currency: String,
    pub tx_type: TransactionType,
    pub category: String,
    pub description: String,
    pub merchant: String,
    pub status: TransactionStatus,
    pub user_id: String,
    pub account_id: String,
    pub location: Option<String>,
    pub reference: Option<String>,
}

/// Aggregate over a record set. Always recomputable from the records; batch
/// deltas merge field-by-field with the average recomputed from merged totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub total_transactions: usize,
    pub total_amount: f64,
    pub total_credits: f64,
    pub total_debits: f64,
    pub average_transaction: f64,
    pub categories: HashMap<String, usize>,
}

impl TransactionSummary {
    /// Merge a delta summary for a disjoint record set into this one.
    pub fn merge(&mut self, delta: &TransactionSummary) {
        self.total_transactions += delta.total_transactions;
        self.total_amount += delta.total_amount;
        self.total_credits += delta.total_credits;
        self.total_debits += delta.total_debits;
        for (category, count) in &delta.categories {
            *self.categories.entry(category.clone()).or_insert(0) += count;
        }
        self.average_transaction = if self.total_transactions > 0 {
            self.total_amount / self.total_transactions as f64
        } else {
            0.0
        };
    }
}

/// Result of one risk-analysis job. Created fresh per job and discarded
/// wholesale when the job is superseded; never merged across jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSummary {
    pub total_risk_score: f64,
    pub high_risk_count: usize,
    pub patterns: HashMap<String, f64>,
    pub anomalies: HashMap<String, f64>,
    pub generated_at: DateTime<Utc>,
}

impl RiskSummary {
    pub fn new() -> Self {
        Self {
            total_risk_score: 0.0,
            high_risk_count: 0,
            patterns: HashMap::new(),
            anomalies: HashMap::new(),
            generated_at: Utc::now(),
        }
    }
}

impl Default for RiskSummary {
    fn default() -> Self {
        Self::new()
    }
}

/// Foreground filter state. `None` / empty fields mean "match everything"
/// for that dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub tx_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub category: Option<String>,
    pub search: String,
}

impl FilterCriteria {
    pub fn is_unfiltered(&self) -> bool {
        self.tx_type.is_none()
            && self.status.is_none()
            && self.category.is_none()
            && self.search.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(count: usize, amount: f64, credits: f64) -> TransactionSummary {
        TransactionSummary {
            total_transactions: count,
            total_amount: amount,
            total_credits: credits,
            total_debits: amount - credits,
            average_transaction: if count > 0 { amount / count as f64 } else { 0.0 },
            categories: HashMap::from([("Shopping".to_string(), count)]),
        }
    }

    #[test]
    fn test_merge_adds_totals_and_recomputes_average() {
        let mut running = summary(4, 400.0, 100.0);
        let delta = summary(6, 200.0, 50.0);
        running.merge(&delta);

        assert_eq!(running.total_transactions, 10);
        assert!((running.total_amount - 600.0).abs() < 1e-9);
        assert!((running.total_credits - 150.0).abs() < 1e-9);
        assert!((running.total_debits - 450.0).abs() < 1e-9);
        assert!((running.average_transaction - 60.0).abs() < 1e-9);
        assert_eq!(running.categories["Shopping"], 10);
    }

    #[test]
    fn test_merge_into_empty_summary() {
        let mut running = TransactionSummary::default();
        running.merge(&summary(3, 90.0, 30.0));
        assert_eq!(running.total_transactions, 3);
        assert!((running.average_transaction - 30.0).abs() < 1e-9);
    }
}
