//! Transaction DTOs

use charge_core::models::{Ruleset, Transaction};
use charge_services::NewTransaction;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Charge calculated by the rules service, as posted by the client system
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    #[validate(length(equal = 1, message = "Region must be a single letter"))]
    pub region: String,

    #[serde(default)]
    pub ruleset: Ruleset,

    #[validate(length(min = 1, max = 12))]
    pub customer_reference: String,

    #[validate(length(min = 1, max = 150))]
    pub licence_number: String,

    #[validate(range(min = 2014, max = 2099))]
    pub financial_year: i32,

    /// Minor currency units
    #[validate(range(min = 0))]
    pub charge_value: i64,

    #[serde(default)]
    pub charge_credit: bool,

    #[validate(length(min = 1, max = 150))]
    pub client_id: Option<String>,

    #[serde(default)]
    pub subject_to_minimum_charge: bool,

    #[serde(default)]
    pub minimum_charge_adjustment: bool,
}

impl From<CreateTransactionRequest> for NewTransaction {
    fn from(req: CreateTransactionRequest) -> Self {
        Self {
            region: req.region,
            ruleset: req.ruleset,
            customer_reference: req.customer_reference,
            licence_number: req.licence_number,
            financial_year: req.financial_year,
            charge_value: req.charge_value,
            charge_credit: req.charge_credit,
            client_id: req.client_id,
            subject_to_minimum_charge: req.subject_to_minimum_charge,
            minimum_charge_adjustment: req.minimum_charge_adjustment,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: Uuid,
    pub client_id: Option<String>,
    pub invoice_id: Uuid,
    pub licence_id: Uuid,
    pub charge_value: i64,
    pub charge_credit: bool,
}

impl From<Transaction> for TransactionResponse {
    fn from(transaction: Transaction) -> Self {
        Self {
            id: transaction.id,
            client_id: transaction.client_id,
            invoice_id: transaction.invoice_id,
            licence_id: transaction.licence_id,
            charge_value: transaction.charge_value,
            charge_credit: transaction.charge_credit,
        }
    }
}
