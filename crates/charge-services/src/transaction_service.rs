//! Transaction intake
//!
//! Adds a pre-calculated charge to a bill run. The invoice and licence rows are
//! created on first use, and the transaction's tallies are patched onto the
//! licence, invoice and bill run in the same unit of work.

use crate::bill_run_service::lock_scoped_bill_run;
use charge_core::{
    ledger::TallyPatch,
    models::{is_valid_region, BillRun, Invoice, Licence, Regime, Ruleset, Transaction},
    traits::{
        BillRunRepository, InvoiceRepository, LedgerStore, LicenceRepository, TransactionRepository,
        UnitOfWork,
    },
    AppError, AppResult,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A charge as returned by the rules service, ready to be added to a bill run
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub region: String,
    pub ruleset: Ruleset,
    pub customer_reference: String,
    pub licence_number: String,
    pub financial_year: i32,
    pub charge_value: i64,
    pub charge_credit: bool,
    pub client_id: Option<String>,
    pub subject_to_minimum_charge: bool,
    pub minimum_charge_adjustment: bool,
}

impl NewTransaction {
    fn validate(&self) -> AppResult<()> {
        if self.charge_value < 0 {
            return Err(AppError::Validation(
                "Charge value must not be negative".to_string(),
            ));
        }
        if !is_valid_region(&self.region) {
            return Err(AppError::Validation(format!("Region '{}' is not valid", self.region)));
        }
        if self.customer_reference.trim().is_empty() || self.licence_number.trim().is_empty() {
            return Err(AppError::Validation(
                "Customer reference and licence number are required".to_string(),
            ));
        }
        Ok(())
    }

    fn into_transaction(
        self,
        bill_run: &BillRun,
        invoice: &Invoice,
        licence: &Licence,
        created_by: Option<String>,
    ) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::now_v7(),
            bill_run_id: bill_run.id,
            invoice_id: invoice.id,
            licence_id: licence.id,
            regime_id: bill_run.regime_id,
            ruleset: self.ruleset,
            region: bill_run.region.clone(),
            customer_reference: invoice.customer_reference.clone(),
            licence_number: licence.licence_number.clone(),
            financial_year: self.financial_year,
            charge_value: self.charge_value,
            charge_credit: self.charge_credit,
            client_id: self.client_id,
            subject_to_minimum_charge: self.subject_to_minimum_charge,
            minimum_charge_adjustment: self.minimum_charge_adjustment,
            rebilled_transaction_id: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

pub struct TransactionService<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> TransactionService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Add a transaction to an editable bill run
    #[instrument(skip(self, regime, request), fields(regime = %regime.slug))]
    pub async fn create_transaction(
        &self,
        regime: &Regime,
        bill_run_id: Uuid,
        request: NewTransaction,
        created_by: Option<String>,
    ) -> AppResult<Transaction> {
        request.validate()?;

        let mut tx = self.store.begin().await?;
        let bill_run = lock_scoped_bill_run(&mut tx, regime, bill_run_id).await?;
        bill_run.ensure_editable()?;

        if !bill_run.region.eq_ignore_ascii_case(&request.region) {
            warn!("Region mismatch on bill run {}", bill_run_id);
            return Err(AppError::DataValidation(format!(
                "Bill run {} is for region {} but the transaction is for region {}.",
                bill_run_id,
                bill_run.region,
                request.region.to_uppercase()
            )));
        }

        if bill_run.ruleset != request.ruleset {
            warn!("Ruleset mismatch on bill run {}", bill_run_id);
            return Err(AppError::DataValidation(format!(
                "Bill run {} is for ruleset {} but the transaction is for ruleset {}.",
                bill_run_id, bill_run.ruleset, request.ruleset
            )));
        }

        if let Some(client_id) = request.client_id.as_deref() {
            if tx.client_id_exists(regime.id, client_id).await? {
                warn!("Duplicate client id {} for regime {}", client_id, regime.slug);
                return Err(AppError::Conflict(format!(
                    "A transaction with Client ID '{}' for Regime '{}' already exists.",
                    client_id, regime.slug
                )));
            }
        }

        let invoice = match tx
            .find_original_invoice(bill_run.id, &request.customer_reference, request.financial_year)
            .await?
        {
            Some(invoice) => invoice,
            None => {
                let invoice = Invoice::new(bill_run.id, &request.customer_reference, request.financial_year);
                tx.insert_invoice(&invoice).await?;
                debug!("Created invoice {} for {}", invoice.id, invoice.customer_reference);
                invoice
            }
        };

        let licence = match tx
            .find_licence_by_number(invoice.id, &request.licence_number)
            .await?
        {
            Some(licence) => licence,
            None => {
                let licence = Licence::new(bill_run.id, invoice.id, &request.licence_number);
                tx.insert_licence(&licence).await?;
                debug!("Created licence {} for {}", licence.id, licence.licence_number);
                licence
            }
        };

        let transaction = request.into_transaction(&bill_run, &invoice, &licence, created_by);
        let lines = transaction.tallies();

        tx.insert_transaction(&transaction).await?;
        tx.apply_licence_patch(licence.id, &lines).await?;
        tx.apply_invoice_patch(invoice.id, &lines).await?;
        tx.apply_bill_run_patch(bill_run.id, &TallyPatch::lines(lines)).await?;
        tx.commit().await?;

        info!(
            "Added transaction {} to bill run {} (invoice {}, licence {})",
            transaction.id, bill_run.id, invoice.id, licence.id
        );

        Ok(transaction)
    }
}
