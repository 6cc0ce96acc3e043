//! Domain layer: entities and value types with no framework dependencies.

pub mod amount;
pub mod id;
pub mod transaction;

pub use id::{TransactionIdGenerator, ID_PREFIX};
pub use transaction::{
    newest_first, FraudScore, ScoreOutOfRange, Transaction, TransactionStatus, UnknownStatus,
    FLAG_THRESHOLD,
};
