//! Sequence counter model
//!
//! One counter row exists per (regime, region). Each column is an independent
//! monotonic sequence; values are only ever handed out by an atomic
//! increment-and-return at the storage layer.

use super::Ruleset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Counter row for a (regime, region) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceCounter {
    pub id: Uuid,
    pub regime_id: Uuid,
    pub region: String,
    pub bill_run_number: i64,
    pub transaction_number_presroc: i64,
    pub transaction_number_sroc: i64,
    pub transaction_file_number: i64,
    pub customer_file_number: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SequenceCounter {
    /// Create a counter row with every sequence starting from the same seed
    pub fn seeded(regime_id: Uuid, region: &str, seed: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            regime_id,
            region: region.to_uppercase(),
            bill_run_number: seed,
            transaction_number_presroc: seed,
            transaction_number_sroc: seed,
            transaction_file_number: seed,
            customer_file_number: seed,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current value of a field
    pub fn value(&self, field: CounterField) -> i64 {
        match field {
            CounterField::BillRunNumber => self.bill_run_number,
            CounterField::TransactionNumberPresroc => self.transaction_number_presroc,
            CounterField::TransactionNumberSroc => self.transaction_number_sroc,
            CounterField::TransactionFileNumber => self.transaction_file_number,
            CounterField::CustomerFileNumber => self.customer_file_number,
        }
    }

    /// Increment a field by one and return the new value
    pub fn increment(&mut self, field: CounterField) -> i64 {
        let slot = match field {
            CounterField::BillRunNumber => &mut self.bill_run_number,
            CounterField::TransactionNumberPresroc => &mut self.transaction_number_presroc,
            CounterField::TransactionNumberSroc => &mut self.transaction_number_sroc,
            CounterField::TransactionFileNumber => &mut self.transaction_file_number,
            CounterField::CustomerFileNumber => &mut self.customer_file_number,
        };
        *slot += 1;
        self.updated_at = Utc::now();
        *slot
    }
}

/// The independent sequences held on a counter row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterField {
    BillRunNumber,
    TransactionNumberPresroc,
    TransactionNumberSroc,
    TransactionFileNumber,
    CustomerFileNumber,
}

impl CounterField {
    /// Transaction number sequence for a ruleset
    pub fn transaction_number(ruleset: Ruleset) -> Self {
        match ruleset {
            Ruleset::Presroc => CounterField::TransactionNumberPresroc,
            Ruleset::Sroc => CounterField::TransactionNumberSroc,
        }
    }

    /// Column backing this sequence in `sequence_counters`
    pub fn column(&self) -> &'static str {
        match self {
            CounterField::BillRunNumber => "bill_run_number",
            CounterField::TransactionNumberPresroc => "transaction_number_presroc",
            CounterField::TransactionNumberSroc => "transaction_number_sroc",
            CounterField::TransactionFileNumber => "transaction_file_number",
            CounterField::CustomerFileNumber => "customer_file_number",
        }
    }
}

impl fmt::Display for CounterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}
