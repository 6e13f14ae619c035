//! Bill run model and status state machine
//!
//! A bill run batches invoices for one regime, region and ruleset. Its status
//! gates which ledger mutations are legal:
//!
//! ```text
//! initialised -> generated -> approved -> pending -> sending -> billed
//!                                            \-> initialised (nothing billable)
//! ```

use super::{LineTallies, Ruleset, SummaryTallies};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Bill run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BillRunStatus {
    /// Accepting transactions
    #[default]
    Initialised,
    /// Summary totals finalized
    Generated,
    /// Approved for sending
    Approved,
    /// Being updated; readers should treat the totals as in flux
    Pending,
    /// References issued, file handed to the downstream system
    Sending,
    /// Confirmed by the downstream system
    Billed,
}

impl fmt::Display for BillRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BillRunStatus::Initialised => "initialised",
            BillRunStatus::Generated => "generated",
            BillRunStatus::Approved => "approved",
            BillRunStatus::Pending => "pending",
            BillRunStatus::Sending => "sending",
            BillRunStatus::Billed => "billed",
        };
        f.write_str(s)
    }
}

impl FromStr for BillRunStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "initialised" => Ok(BillRunStatus::Initialised),
            "generated" => Ok(BillRunStatus::Generated),
            "approved" => Ok(BillRunStatus::Approved),
            "pending" => Ok(BillRunStatus::Pending),
            "sending" => Ok(BillRunStatus::Sending),
            "billed" => Ok(BillRunStatus::Billed),
            _ => Err(AppError::InvalidInput(format!("Unknown bill run status '{}'", s))),
        }
    }
}

impl BillRunStatus {
    /// Summary totals have been finalized for this bill run
    pub fn is_generated(&self) -> bool {
        matches!(
            self,
            BillRunStatus::Generated
                | BillRunStatus::Approved
                | BillRunStatus::Sending
                | BillRunStatus::Billed
        )
    }

    /// Transactions and rebill invoices may be added
    pub fn is_editable(&self) -> bool {
        matches!(self, BillRunStatus::Initialised)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, BillRunStatus::Pending)
    }
}

/// Bill run entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillRun {
    pub id: Uuid,
    pub regime_id: Uuid,
    pub region: String,
    pub ruleset: Ruleset,
    pub status: BillRunStatus,

    /// Issued from the sequence counter when the bill run is created
    pub bill_run_number: Option<i64>,

    /// Issued when the bill run is sent with at least one billable invoice
    pub file_reference: Option<String>,

    pub tallies: LineTallies,
    pub summary: SummaryTallies,

    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BillRun {
    /// Create a new, empty bill run
    pub fn new(regime_id: Uuid, region: &str, ruleset: Ruleset, created_by: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            regime_id,
            region: region.to_uppercase(),
            ruleset,
            status: BillRunStatus::Initialised,
            bill_run_number: None,
            file_reference: None,
            tallies: LineTallies::default(),
            summary: SummaryTallies::default(),
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// No transaction lines of any kind
    pub fn is_empty(&self) -> bool {
        self.tallies.line_count() == 0
    }

    /// Guard for adding transactions or invoices
    pub fn ensure_editable(&self) -> Result<(), AppError> {
        if self.status.is_editable() {
            Ok(())
        } else {
            Err(AppError::Conflict(format!(
                "Bill run {} cannot be edited because its status is {}.",
                self.id, self.status
            )))
        }
    }
}
