//! Bill run DTOs

use crate::dto::invoice::InvoiceResponse;
use charge_core::models::{BillRun, BillRunStatus, Invoice, LineTallies, Ruleset, SummaryTallies};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Bill run creation request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBillRunRequest {
    #[validate(length(equal = 1, message = "Region must be a single letter"))]
    pub region: String,

    #[serde(default)]
    pub ruleset: Ruleset,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillRunResponse {
    pub id: Uuid,
    pub bill_run_number: Option<i64>,
    pub region: String,
    pub ruleset: Ruleset,
    pub status: BillRunStatus,
    pub file_reference: Option<String>,

    #[serde(flatten)]
    pub tallies: LineTallies,

    #[serde(flatten)]
    pub summary: SummaryTallies,

    pub net_total: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoices: Option<Vec<InvoiceResponse>>,
}

impl From<BillRun> for BillRunResponse {
    fn from(bill_run: BillRun) -> Self {
        Self {
            id: bill_run.id,
            bill_run_number: bill_run.bill_run_number,
            region: bill_run.region,
            ruleset: bill_run.ruleset,
            status: bill_run.status,
            file_reference: bill_run.file_reference,
            tallies: bill_run.tallies,
            summary: bill_run.summary,
            net_total: bill_run.summary.net_total(),
            invoices: None,
        }
    }
}

impl BillRunResponse {
    /// Full view including the bill run's invoices
    pub fn with_invoices(bill_run: BillRun, invoices: Vec<Invoice>) -> Self {
        Self {
            invoices: Some(invoices.into_iter().map(InvoiceResponse::from).collect()),
            ..Self::from(bill_run)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BillRunStatusResponse {
    pub status: BillRunStatus,
}
