//! Implementations of the `TransactionStore` port.

pub mod memory_transaction_store;
pub mod postgres_transaction_store;

pub use memory_transaction_store::MemoryTransactionStore;
pub use postgres_transaction_store::PostgresTransactionStore;

/// Capacity of the broadcast buffer behind each store's change feed.
pub const DEFAULT_FEED_CAPACITY: usize = 256;
