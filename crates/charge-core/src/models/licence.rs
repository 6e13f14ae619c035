//! Licence model

use super::LineTallies;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Groups the transactions for one licence number within an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Licence {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub bill_run_id: Uuid,
    pub licence_number: String,
    pub tallies: LineTallies,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Licence {
    pub fn new(bill_run_id: Uuid, invoice_id: Uuid, licence_number: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            invoice_id,
            bill_run_id,
            licence_number: licence_number.to_string(),
            tallies: LineTallies::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Mirror of this licence on another invoice, with zero tallies
    pub fn mirrored_on(&self, bill_run_id: Uuid, invoice_id: Uuid) -> Self {
        Self::new(bill_run_id, invoice_id, &self.licence_number)
    }
}
