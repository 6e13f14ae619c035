//! Invoice DTOs

use charge_core::models::{Invoice, InvoiceFlags, RebilledType};
use charge_services::RebilledInvoices;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub customer_reference: String,
    pub financial_year: i32,
    pub credit_line_value: i64,
    pub debit_line_value: i64,
    pub net_total: i64,

    #[serde(flatten)]
    pub flags: InvoiceFlags,

    pub transaction_reference: Option<String>,
    pub rebilled_type: RebilledType,
    pub rebilled_invoice_id: Option<Uuid>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            net_total: invoice.net_total(),
            credit_line_value: invoice.tallies.credit_line_value,
            debit_line_value: invoice.tallies.debit_line_value,
            customer_reference: invoice.customer_reference,
            financial_year: invoice.financial_year,
            flags: invoice.flags,
            transaction_reference: invoice.transaction_reference,
            rebilled_type: invoice.rebilled_type,
            rebilled_invoice_id: invoice.rebilled_invoice_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebilledInvoiceRef {
    pub id: Uuid,
    pub rebilled_type: RebilledType,
}

/// Ids of the cancel and rebill invoices raised by a rebill request
#[derive(Debug, Clone, Serialize)]
pub struct RebillResponse {
    pub invoices: Vec<RebilledInvoiceRef>,
}

impl From<&RebilledInvoices> for RebillResponse {
    fn from(rebilled: &RebilledInvoices) -> Self {
        let invoices = [&rebilled.cancel_invoice, &rebilled.rebill_invoice]
            .into_iter()
            .map(|invoice| RebilledInvoiceRef {
                id: invoice.id,
                rebilled_type: invoice.rebilled_type,
            })
            .collect();

        Self { invoices }
    }
}
