//! Synthetic transaction generator
//!
//! Pure record production for the streaming pipeline. Draw probabilities are
//! part of the observable contract (tests assert distributional shape, not
//! exact values): ~60% debit, ~90% completed with the rest split between
//! pending and failed, ~70% carry a location, ~50% carry a reference.

use chrono::{Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{TransactionRecord, TransactionStatus, TransactionSummary, TransactionType};

const CURRENCY: &str = "USD";
/// Amounts inflate by this factor when the synthetic risk signal is positive.
const RISK_AMOUNT_MULTIPLIER: f64 = 1.5;
/// Record timestamps are spread over this many days back from now.
const TIMESTAMP_SPREAD_DAYS: i64 = 90;

const MERCHANTS: &[&str] = &[
    "Amazon",
    "Walmart",
    "Target",
    "Starbucks",
    "Shell",
    "Whole Foods",
    "Netflix",
    "Uber",
    "Delta Airlines",
    "Home Depot",
    "Best Buy",
    "CVS Pharmacy",
    "Chipotle",
    "Apple Store",
    "Costco",
];

const CATEGORIES: &[&str] = &[
    "Shopping",
    "Groceries",
    "Dining",
    "Travel",
    "Entertainment",
    "Utilities",
    "Healthcare",
    "Transport",
];

const LOCATIONS: &[&str] = &[
    "New York, NY",
    "San Francisco, CA",
    "Chicago, IL",
    "Austin, TX",
    "Seattle, WA",
    "Miami, FL",
    "Denver, CO",
    "Boston, MA",
];

const DESCRIPTION_VERBS: &[&str] = &["Purchase at", "Payment to", "Order from", "Subscription -"];

/// Per-index synthetic risk signal: weighted trigonometric combination of the
/// logical index. Only used to add deterministic-looking variance to amounts;
/// entirely unrelated to the risk scoring heuristics in `scoring`.
fn synthetic_risk(index: usize) -> f64 {
    let i = index as f64;
    (i * 0.1).sin() * 0.5 + (i * 0.05).cos() * 0.3 + (i * 0.01).sin() * 0.2
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn choose<'a, R: Rng>(rng: &mut R, items: &[&'a str]) -> &'a str {
    items[rng.gen_range(0..items.len())]
}

/// Produces transaction records for the streaming pipeline.
pub struct TransactionGenerator {
    rng: ChaCha8Rng,
}

impl TransactionGenerator {
    pub fn new() -> Self {
        // ChaCha keeps the test path and the entropy path on the same engine
        let mut seeder = StdRng::from_entropy();
        Self {
            rng: ChaCha8Rng::seed_from_u64(seeder.gen()),
        }
    }

    /// Deterministic generator for reproducible tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Generate exactly `count` records. `offset` is the logical index of the
    /// first record within the overall run; it seeds the per-index risk
    /// signal and description numbering, nothing else.
    pub fn generate(&mut self, count: usize, offset: usize) -> Vec<TransactionRecord> {
        let mut records = Vec::with_capacity(count);
        let now = Utc::now();

        for i in 0..count {
            let index = offset + i;
            let rng = &mut self.rng;

            let mut amount = 1.0 + rng.gen::<f64>() * 1499.0;
            if synthetic_risk(index) > 0.0 {
                amount *= RISK_AMOUNT_MULTIPLIER;
            }
            let amount = round_cents(amount);

            let tx_type = if rng.gen_ratio(3, 5) {
                TransactionType::Debit
            } else {
                TransactionType::Credit
            };

            let status_roll = rng.gen::<f64>();
            let status = if status_roll < 0.90 {
                TransactionStatus::Completed
            } else if status_roll < 0.95 {
                TransactionStatus::Pending
            } else {
                TransactionStatus::Failed
            };

            let merchant = choose(rng, MERCHANTS).to_string();
            let category = choose(rng, CATEGORIES).to_string();
            let description = format!("{} {} #{}", choose(rng, DESCRIPTION_VERBS), merchant, index);

            let location = if rng.gen_ratio(7, 10) {
                Some(choose(rng, LOCATIONS).to_string())
            } else {
                None
            };
            let reference = if rng.gen_ratio(1, 2) {
                Some(format!("REF-{:08}", rng.gen_range(0..100_000_000u32)))
            } else {
                None
            };

            let age = ChronoDuration::seconds(
                rng.gen_range(0..TIMESTAMP_SPREAD_DAYS * 24 * 3600),
            );

            records.push(TransactionRecord {
                id: format!("txn-{}", Uuid::new_v4().simple()),
                timestamp: now - age,
                amount,
                currency: CURRENCY.to_string(),
                tx_type,
                category,
                description,
                merchant,
                status,
                user_id: format!("user-{}", rng.gen_range(1..=50u32)),
                account_id: format!("acct-{}", rng.gen_range(1..=20u32)),
                location,
                reference,
            });
        }

        records
    }
}

impl Default for TransactionGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary for a record set in a single O(n) traversal.
pub fn summarize(records: &[TransactionRecord]) -> TransactionSummary {
    let mut total_amount = 0.0;
    let mut total_credits = 0.0;
    let mut total_debits = 0.0;
    let mut categories: HashMap<String, usize> = HashMap::new();

    for record in records {
        total_amount += record.amount;
        match record.tx_type {
            TransactionType::Credit => total_credits += record.amount,
            TransactionType::Debit => total_debits += record.amount,
        }
        *categories.entry(record.category.clone()).or_insert(0) += 1;
    }

    let count = records.len();
    TransactionSummary {
        total_transactions: count,
        total_amount,
        total_credits,
        total_debits,
        average_transaction: if count > 0 {
            total_amount / count as f64
        } else {
            0.0
        },
        categories,
    }
}
