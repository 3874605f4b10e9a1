//! Per-record risk heuristics
//!
//! Pure functions over a target record and the full candidate set. The
//! combined score is the exact additive formula (range roughly 0.2-1.8) with
//! a 0.7 high-risk threshold; the scale is intentionally not normalized to
//! [0,1] for compatibility with existing consumers of these scores.

use chrono::{Duration, Timelike};

use crate::models::TransactionRecord;

/// Combined risk above this value classifies a record as high risk.
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

const UNFAMILIAR_MERCHANT_RISK: f64 = 0.8;
const FAMILIAR_MERCHANT_RISK: f64 = 0.2;
const MERCHANT_FAMILIARITY_MIN: usize = 5;

const LARGE_AMOUNT_RISK: f64 = 0.6;
const NORMAL_AMOUNT_RISK: f64 = 0.1;
const LARGE_AMOUNT_CUTOFF: f64 = 1000.0;

const NIGHT_HOUR_RISK: f64 = 0.4;
const DAY_HOUR_RISK: f64 = 0.1;
const NIGHT_HOUR_END: u32 = 6;

const PATTERN_AMOUNT_TOLERANCE: f64 = 10.0;
const PATTERN_MERCHANT_MIN: usize = 3;
const PATTERN_MERCHANT_BONUS: f64 = 0.3;
const PATTERN_VELOCITY_MIN: usize = 5;
const PATTERN_VELOCITY_BONUS: f64 = 0.5;

const ANOMALY_DEVIATION_WEIGHT: f64 = 0.3;
const ANOMALY_LOCATION_BONUS: f64 = 0.4;
const ANOMALY_RECENT_WINDOW: usize = 10;

/// 0.8 when the merchant appears fewer than 5 times in the candidate set,
/// 0.2 otherwise.
pub fn merchant_familiarity_risk(target: &TransactionRecord, records: &[TransactionRecord]) -> f64 {
    let occurrences = records
        .iter()
        .filter(|r| r.merchant == target.merchant)
        .count();
    if occurrences < MERCHANT_FAMILIARITY_MIN {
        UNFAMILIAR_MERCHANT_RISK
    } else {
        FAMILIAR_MERCHANT_RISK
    }
}

pub fn amount_risk(target: &TransactionRecord) -> f64 {
    if target.amount > LARGE_AMOUNT_CUTOFF {
        LARGE_AMOUNT_RISK
    } else {
        NORMAL_AMOUNT_RISK
    }
}

pub fn time_of_day_risk(target: &TransactionRecord) -> f64 {
    if target.timestamp.hour() < NIGHT_HOUR_END {
        NIGHT_HOUR_RISK
    } else {
        DAY_HOUR_RISK
    }
}

/// Exact additive combination of the three base heuristics.
pub fn combined_risk(target: &TransactionRecord, records: &[TransactionRecord]) -> f64 {
    merchant_familiarity_risk(target, records) + amount_risk(target) + time_of_day_risk(target)
}

/// Repetition and velocity bonuses. +0.3 when more than 3 records share the
/// merchant with an amount within 10 units; +0.5 when more than 5 records
/// from the same user fall inside a symmetric one-hour window.
pub fn pattern_score(target: &TransactionRecord, records: &[TransactionRecord]) -> f64 {
    let mut score = 0.0;

    let similar = records
        .iter()
        .filter(|r| {
            r.merchant == target.merchant
                && (r.amount - target.amount).abs() < PATTERN_AMOUNT_TOLERANCE
        })
        .count();
    if similar > PATTERN_MERCHANT_MIN {
        score += PATTERN_MERCHANT_BONUS;
    }

    let window = Duration::hours(1);
    let velocity = records
        .iter()
        .filter(|r| {
            r.user_id == target.user_id
                && (r.timestamp - target.timestamp).abs() <= window
        })
        .count();
    if velocity > PATTERN_VELOCITY_MIN {
        score += PATTERN_VELOCITY_BONUS;
    }

    score
}

/// Deviation of the target's amount from its user's mean, weighted by 0.3,
/// plus a flat 0.4 when the target's location is absent from that user's 10
/// most recent other records. Capped at 1.0.
pub fn anomaly_score(target: &TransactionRecord, records: &[TransactionRecord]) -> f64 {
    let user_records: Vec<&TransactionRecord> = records
        .iter()
        .filter(|r| r.user_id == target.user_id)
        .collect();

    let mut score = 0.0;
    if !user_records.is_empty() {
        let mean: f64 =
            user_records.iter().map(|r| r.amount).sum::<f64>() / user_records.len() as f64;
        if mean > 0.0 {
            score += ((target.amount - mean).abs() / mean) * ANOMALY_DEVIATION_WEIGHT;
        }
    }

    if let Some(location) = &target.location {
        let mut others: Vec<&&TransactionRecord> = user_records
            .iter()
            .filter(|r| r.id != target.id)
            .collect();
        others.sort_by_key(|r| r.timestamp);
        let seen_recently = others
            .iter()
            .rev()
            .take(ANOMALY_RECENT_WINDOW)
            .any(|r| r.location.as_deref() == Some(location.as_str()));
        if !others.is_empty() && !seen_recently {
            score += ANOMALY_LOCATION_BONUS;
        }
    }

    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TransactionStatus, TransactionType};
    use chrono::{TimeZone, Utc};

    fn record(id: &str, amount: f64, merchant: &str, user: &str, hour: u32) -> TransactionRecord {
        TransactionRecord {
            id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 10, hour, 15, 0).unwrap(),
            amount,
            currency: "USD".to_string(),
            tx_type: TransactionType::Debit,
            category: "Shopping".to_string(),
            description: format!("Purchase at {merchant}"),
            merchant: merchant.to_string(),
            status: TransactionStatus::Completed,
            user_id: user.to_string(),
            account_id: "acct-1".to_string(),
            location: None,
            reference: None,
        }
    }

    #[test]
    fn test_maximal_combined_risk_is_exactly_1_8() {
        // Unfamiliar merchant, amount over 1000, hour before 6
        let target = record("t1", 1500.0, "Obscure Shop", "user-1", 3);
        let records = vec![target.clone()];
        let risk = combined_risk(&target, &records);
        assert!((risk - 1.8).abs() < 1e-9, "risk {risk}");
    }

    #[test]
    fn test_minimal_combined_risk_is_exactly_0_4() {
        let target = record("t1", 50.0, "Amazon", "user-1", 14);
        let mut records = vec![target.clone()];
        for i in 0..5 {
            records.push(record(&format!("r{i}"), 40.0, "Amazon", "user-2", 14));
        }
        let risk = combined_risk(&target, &records);
        assert!((risk - 0.4).abs() < 1e-9, "risk {risk}");
    }

    #[test]
    fn test_merchant_familiarity_boundary() {
        let target = record("t1", 10.0, "Shell", "user-1", 12);
        // 4 occurrences total: still unfamiliar
        let mut records = vec![target.clone()];
        for i in 0..3 {
            records.push(record(&format!("r{i}"), 10.0, "Shell", "user-2", 12));
        }
        assert_eq!(merchant_familiarity_risk(&target, &records), 0.8);
        // 5th occurrence flips it
        records.push(record("r4", 10.0, "Shell", "user-3", 12));
        assert_eq!(merchant_familiarity_risk(&target, &records), 0.2);
    }

    #[test]
    fn test_pattern_score_merchant_repetition() {
        let target = record("t1", 100.0, "Target", "user-1", 12);
        let mut records = vec![target.clone()];
        records.push(record("r1", 105.0, "Target", "user-2", 12));
        records.push(record("r2", 95.0, "Target", "user-3", 12));
        // 3 similar records: no bonus yet
        assert_eq!(pattern_score(&target, &records), 0.0);
        records.push(record("r3", 99.0, "Target", "user-4", 12));
        assert!((pattern_score(&target, &records) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_pattern_score_velocity_and_both_bonuses() {
        let target = record("t1", 100.0, "Target", "user-1", 12);
        let mut records = vec![target.clone()];
        // 5 more same-user records in the window (6 total > 5)
        for i in 0..5 {
            records.push(record(&format!("u{i}"), 500.0 + i as f64 * 50.0, "Shell", "user-1", 12));
        }
        assert!((pattern_score(&target, &records) - 0.5).abs() < 1e-9);

        // Add merchant repetition on top
        for i in 0..4 {
            records.push(record(&format!("m{i}"), 102.0, "Target", "user-9", 12));
        }
        assert!((pattern_score(&target, &records) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_anomaly_deviation_weighting() {
        let target = record("t1", 400.0, "Amazon", "user-1", 12);
        let records = vec![
            target.clone(),
            record("r1", 100.0, "Amazon", "user-1", 12),
            record("r2", 100.0, "Amazon", "user-1", 12),
        ];
        // user mean = 200, deviation = |400-200|/200 = 1.0, weighted 0.3
        let score = anomaly_score(&target, &records);
        assert!((score - 0.3).abs() < 1e-9, "score {score}");
    }

    #[test]
    fn test_anomaly_location_bonus_and_cap() {
        let mut target = record("t1", 1000.0, "Amazon", "user-1", 12);
        target.location = Some("Reykjavik, IS".to_string());
        let mut peer = record("r1", 10.0, "Amazon", "user-1", 12);
        peer.location = Some("Boston, MA".to_string());
        let records = vec![target.clone(), peer];

        // mean = 505, deviation weight alone is ~0.294; bonus pushes past it
        let score = anomaly_score(&target, &records);
        assert!(score > 0.4);
        assert!(score <= 1.0);

        // Known location in the recent window: no bonus
        let mut home = target.clone();
        home.location = Some("Boston, MA".to_string());
        let score = anomaly_score(&home, &records);
        assert!(score < 0.4);
    }
}
