//! Invoice model
//!
//! One customer's charges within a bill run for a financial year. The derived
//! flags are recomputed whenever the invoice's tallies are changed by a
//! deletion, and when the bill run is generated.

use super::LineTallies;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Rebilling role of an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RebilledType {
    /// Raised from incoming transactions
    #[default]
    #[serde(rename = "O")]
    Original,
    /// Reverses a previously billed invoice
    #[serde(rename = "C")]
    Cancel,
    /// Reissues a previously billed invoice
    #[serde(rename = "R")]
    Rebill,
}

impl RebilledType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebilledType::Original => "O",
            RebilledType::Cancel => "C",
            RebilledType::Rebill => "R",
        }
    }
}

impl fmt::Display for RebilledType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RebilledType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "O" | "o" => Ok(RebilledType::Original),
            "C" | "c" => Ok(RebilledType::Cancel),
            "R" | "r" => Ok(RebilledType::Rebill),
            _ => Err(AppError::InvalidInput(format!("Unknown rebilled type '{}'", s))),
        }
    }
}

/// Whether an invoice is sent downstream as a credit note or an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    #[serde(rename = "C")]
    CreditNote,
    #[serde(rename = "I")]
    Invoice,
}

impl TransactionType {
    /// Classify a net total: negative is a credit note, anything else an invoice
    pub fn for_net_total(net_total: i64) -> Self {
        if net_total < 0 {
            TransactionType::CreditNote
        } else {
            TransactionType::Invoice
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            TransactionType::CreditNote => 'C',
            TransactionType::Invoice => 'I',
        }
    }
}

impl FromStr for TransactionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "C" => Ok(TransactionType::CreditNote),
            "I" => Ok(TransactionType::Invoice),
            _ => Err(AppError::InvalidInput(format!(
                "Transaction type must be 'C' or 'I', got '{}'",
                s
            ))),
        }
    }
}

/// Flags derived from an invoice's tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceFlags {
    pub zero_value_invoice: bool,
    pub deminimis_invoice: bool,
    pub minimum_charge_invoice: bool,
}

/// Invoice entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub bill_run_id: Uuid,
    pub customer_reference: String,
    pub financial_year: i32,

    pub tallies: LineTallies,
    pub flags: InvoiceFlags,

    /// Issued when the bill run is sent
    pub transaction_reference: Option<String>,

    pub rebilled_type: RebilledType,
    pub rebilled_invoice_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Create an original invoice with zero tallies
    pub fn new(bill_run_id: Uuid, customer_reference: &str, financial_year: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            bill_run_id,
            customer_reference: customer_reference.to_uppercase(),
            financial_year,
            tallies: LineTallies::default(),
            flags: InvoiceFlags::default(),
            transaction_reference: None,
            rebilled_type: RebilledType::Original,
            rebilled_invoice_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a cancel or rebill invoice for `original` on another bill run
    pub fn rebilling_of(bill_run_id: Uuid, original: &Invoice, rebilled_type: RebilledType) -> Self {
        Self {
            rebilled_type,
            rebilled_invoice_id: Some(original.id),
            ..Self::new(bill_run_id, &original.customer_reference, original.financial_year)
        }
    }

    /// Debit value minus credit value
    pub fn net_total(&self) -> i64 {
        self.tallies.net_total()
    }

    pub fn absolute_net_total(&self) -> i64 {
        self.net_total().abs()
    }

    pub fn transaction_type(&self) -> TransactionType {
        TransactionType::for_net_total(self.net_total())
    }

    /// Sent downstream (not deminimis, not zero value)
    pub fn is_billable(&self) -> bool {
        !self.flags.deminimis_invoice && !self.flags.zero_value_invoice
    }

    /// Still needs a transaction reference when its bill run is sent
    pub fn awaiting_reference(&self) -> bool {
        self.is_billable() && self.transaction_reference.is_none()
    }
}
