//! Transaction id generation.
//!
//! Ids are `TX` followed by 19 decimal digits: 13 digits of Unix milliseconds
//! and 6 random digits. A generator never hands out the same suffix twice and
//! never goes backwards, even if the wall clock does. Uniqueness across
//! processes is enforced by the store at insert time.

use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

pub const ID_PREFIX: &str = "TX";
const SUFFIX_WIDTH: usize = 19;
const RANDOM_SPACE: u64 = 1_000_000;

#[derive(Debug, Default)]
pub struct TransactionIdGenerator {
    last: AtomicU64,
}

impl TransactionIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        let candidate = millis * RANDOM_SPACE + rand::thread_rng().gen_range(0..RANDOM_SPACE);

        let mut previous = self.last.load(Ordering::Relaxed);
        loop {
            let next = candidate.max(previous + 1);
            match self
                .last
                .compare_exchange_weak(previous, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return format!("{}{:0width$}", ID_PREFIX, next, width = SUFFIX_WIDTH),
                Err(actual) => previous = actual,
            }
        }
    }
}
