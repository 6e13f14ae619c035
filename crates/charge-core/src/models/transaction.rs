//! Transaction model
//!
//! An individual charge line. Transactions are never updated after creation;
//! they are only inserted (directly or as rebilling copies) and removed by
//! cascade when their licence or invoice is deleted.

use super::{LineTallies, Ruleset};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transaction entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub bill_run_id: Uuid,
    pub invoice_id: Uuid,
    pub licence_id: Uuid,
    pub regime_id: Uuid,
    pub ruleset: Ruleset,
    pub region: String,
    pub customer_reference: String,
    pub licence_number: String,
    pub financial_year: i32,

    /// Calculated charge in minor currency units, never negative
    pub charge_value: i64,

    /// True for a credit, false for a debit
    pub charge_credit: bool,

    /// Caller-supplied identifier, unique per regime when present
    pub client_id: Option<String>,

    pub subject_to_minimum_charge: bool,
    pub minimum_charge_adjustment: bool,

    /// Source transaction when this row is a rebilling copy
    pub rebilled_transaction_id: Option<Uuid>,

    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Tallies this transaction adds to its licence, invoice and bill run
    pub fn tallies(&self) -> LineTallies {
        LineTallies::for_line(
            self.charge_value,
            self.charge_credit,
            self.subject_to_minimum_charge,
        )
    }

    /// Copy of this transaction placed under another bill run, invoice and licence
    ///
    /// The copy gets a fresh id and timestamps, drops the client id (it must stay
    /// unique per regime) and points back at its source. `invert` flips the
    /// credit flag, which is how the cancel side of a rebill reverses a charge.
    pub fn rebill_copy(
        &self,
        bill_run_id: Uuid,
        invoice_id: Uuid,
        licence_id: Uuid,
        invert: bool,
        created_by: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            bill_run_id,
            invoice_id,
            licence_id,
            regime_id: self.regime_id,
            ruleset: self.ruleset,
            region: self.region.clone(),
            customer_reference: self.customer_reference.clone(),
            licence_number: self.licence_number.clone(),
            financial_year: self.financial_year,
            charge_value: self.charge_value,
            charge_credit: self.charge_credit != invert,
            client_id: None,
            subject_to_minimum_charge: self.subject_to_minimum_charge,
            minimum_charge_adjustment: self.minimum_charge_adjustment,
            rebilled_transaction_id: Some(self.id),
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::now_v7(),
            bill_run_id: Uuid::now_v7(),
            invoice_id: Uuid::now_v7(),
            licence_id: Uuid::now_v7(),
            regime_id: Uuid::now_v7(),
            ruleset: Ruleset::Presroc,
            region: "A".to_string(),
            customer_reference: "CUST1".to_string(),
            licence_number: "LIC/1".to_string(),
            financial_year: 2021,
            charge_value: 2500,
            charge_credit: false,
            client_id: Some("client-1".to_string()),
            subject_to_minimum_charge: true,
            minimum_charge_adjustment: false,
            rebilled_transaction_id: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_cancel_copy_inverts_credit() {
        let source = sample();
        let copy = source.rebill_copy(Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7(), true, None);

        assert!(copy.charge_credit);
        assert_eq!(copy.charge_value, source.charge_value);
        assert_eq!(copy.client_id, None);
        assert_eq!(copy.rebilled_transaction_id, Some(source.id));
        assert_ne!(copy.id, source.id);
        assert_eq!(copy.tallies(), source.tallies().inverted());
    }

    #[test]
    fn test_rebill_copy_keeps_sign() {
        let source = sample();
        let copy = source.rebill_copy(Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7(), false, None);

        assert!(!copy.charge_credit);
        assert_eq!(copy.tallies(), source.tallies());
        assert_eq!(copy.licence_number, "LIC/1");
    }
}
