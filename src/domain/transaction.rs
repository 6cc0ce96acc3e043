//! Transaction domain entity.
//! Framework-agnostic representation of a scored peer-to-peer payment.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Scores strictly above this value are flagged at creation.
pub const FLAG_THRESHOLD: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Flagged,
}

impl TransactionStatus {
    /// Status decision applied once, at creation.
    pub fn from_score(score: FraudScore) -> Self {
        if score.value() > FLAG_THRESHOLD {
            TransactionStatus::Flagged
        } else {
            TransactionStatus::Completed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Flagged => "flagged",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown transaction status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for TransactionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "flagged" => Ok(TransactionStatus::Flagged),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("fraud score {0} is outside 0..=100")]
pub struct ScoreOutOfRange(pub i64);

/// Risk estimate in `0..=100`; higher is riskier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct FraudScore(u8);

impl FraudScore {
    pub const MAX: u8 = 100;

    pub fn new(value: i64) -> Result<Self, ScoreOutOfRange> {
        if (0..=i64::from(Self::MAX)).contains(&value) {
            Ok(FraudScore(value as u8))
        } else {
            Err(ScoreOutOfRange(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for FraudScore {
    type Error = ScoreOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        FraudScore::new(value)
    }
}

impl From<FraudScore> for i64 {
    fn from(score: FraudScore) -> Self {
        i64::from(score.0)
    }
}

impl fmt::Display for FraudScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Domain entity representing a scored transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    #[serde(with = "crate::domain::amount")]
    pub amount: BigDecimal,
    pub date: DateTime<Utc>,
    pub status: TransactionStatus,
    pub fraud_score: FraudScore,
}

impl Transaction {
    /// Builds a freshly scored transaction; the status follows the flag threshold.
    pub fn scored(
        id: String,
        sender_id: String,
        recipient_id: String,
        amount: BigDecimal,
        date: DateTime<Utc>,
        fraud_score: FraudScore,
    ) -> Self {
        Self {
            id,
            sender_id,
            recipient_id,
            amount,
            date,
            status: TransactionStatus::from_score(fraud_score),
            fraud_score,
        }
    }

    /// Manual review transition. Only the status changes.
    pub fn approve(&mut self) {
        self.status = TransactionStatus::Completed;
    }

    pub fn is_flagged(&self) -> bool {
        self.status == TransactionStatus::Flagged
    }
}

/// List ordering used by every read-all path: `date` descending, then `id` descending.
pub fn newest_first(a: &Transaction, b: &Transaction) -> Ordering {
    b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(id: &str, score: i64, secs: i64) -> Transaction {
        Transaction::scored(
            id.to_string(),
            "U1".to_string(),
            "Alice Johnson".to_string(),
            "50.00".parse().unwrap(),
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            FraudScore::new(score).unwrap(),
        )
    }

    #[test]
    fn test_status_threshold_boundary() {
        assert_eq!(
            TransactionStatus::from_score(FraudScore::new(80).unwrap()),
            TransactionStatus::Completed
        );
        assert_eq!(
            TransactionStatus::from_score(FraudScore::new(81).unwrap()),
            TransactionStatus::Flagged
        );
        assert_eq!(
            TransactionStatus::from_score(FraudScore::new(0).unwrap()),
            TransactionStatus::Completed
        );
    }

    #[test]
    fn test_fraud_score_range() {
        assert!(FraudScore::new(-1).is_err());
        assert!(FraudScore::new(101).is_err());
        assert_eq!(FraudScore::new(100).unwrap().value(), 100);
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Completed,
            TransactionStatus::Flagged,
        ] {
            assert_eq!(status.as_str().parse::<TransactionStatus>(), Ok(status));
        }
        assert!("settled".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_approve_only_touches_status() {
        let mut tx = sample("TX1", 95, 0);
        let before = tx.clone();
        assert!(tx.is_flagged());

        tx.approve();

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.fraud_score, before.fraud_score);
        assert_eq!(tx.amount, before.amount);
        assert_eq!(tx.date, before.date);
    }

    #[test]
    fn test_wire_format() {
        let tx = sample("TX1", 10, 0);
        let json = serde_json::to_value(&tx).unwrap();

        assert_eq!(json["status"], "completed");
        assert_eq!(json["fraud_score"], 10);
        assert_eq!(json["amount"], 50.0);
        assert!(json["date"].as_str().unwrap().starts_with("2023-11-14T"));
    }

    #[test]
    fn test_rejects_out_of_range_score_on_decode() {
        let mut json = serde_json::to_value(sample("TX1", 10, 0)).unwrap();
        json["fraud_score"] = serde_json::json!(140);
        assert!(serde_json::from_value::<Transaction>(json).is_err());
    }

    #[test]
    fn test_newest_first_ordering() {
        let mut rows = vec![sample("TX1", 1, 10), sample("TX3", 1, 30), sample("TX2", 1, 30)];
        rows.sort_by(newest_first);
        let ids: Vec<_> = rows.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["TX3", "TX2", "TX1"]);
    }
}
