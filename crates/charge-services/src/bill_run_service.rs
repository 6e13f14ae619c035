//! Bill run service
//!
//! Creation and the status state machine:
//!
//! - `generate`: initialised (non-empty) -> generated, recomputing invoice flags and the summary
//! - `approve`: generated -> approved
//! - `send`: approved -> pending -> sending, or back to initialised when nothing is billable
//! - `mark_billed`: sending -> billed
//!
//! Every transition locks the bill run row first, so transitions on one bill
//! run never interleave with each other or with ledger patches.

use crate::sequence;
use charge_core::{
    config::BillingConfig,
    ledger::{compute_invoice_flags, generate_summary},
    models::{is_valid_region, BillRun, BillRunStatus, Invoice, Regime, Ruleset},
    traits::{BillRunRepository, InvoiceRepository, LedgerStore, UnitOfWork},
    AppError, AppResult,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Fetch a bill run and check it belongs to `regime`
pub(crate) async fn find_scoped_bill_run<T: BillRunRepository>(
    tx: &mut T,
    regime: &Regime,
    id: Uuid,
) -> AppResult<BillRun> {
    match tx.find_bill_run(id).await? {
        Some(bill_run) if bill_run.regime_id == regime.id => Ok(bill_run),
        _ => Err(AppError::BillRunNotFound(id.to_string())),
    }
}

/// Lock a bill run for the rest of the unit of work and check it belongs to `regime`
pub(crate) async fn lock_scoped_bill_run<T: BillRunRepository>(
    tx: &mut T,
    regime: &Regime,
    id: Uuid,
) -> AppResult<BillRun> {
    match tx.lock_bill_run(id).await? {
        Some(bill_run) if bill_run.regime_id == regime.id => Ok(bill_run),
        _ => Err(AppError::BillRunNotFound(id.to_string())),
    }
}

pub struct BillRunService<S: LedgerStore> {
    store: Arc<S>,
    billing: BillingConfig,
}

impl<S: LedgerStore> BillRunService<S> {
    pub fn new(store: Arc<S>, billing: BillingConfig) -> Self {
        Self { store, billing }
    }

    /// Create an empty bill run, issuing its bill run number in the same unit of work
    #[instrument(skip(self, regime), fields(regime = %regime.slug))]
    pub async fn create(
        &self,
        regime: &Regime,
        region: &str,
        ruleset: Ruleset,
        created_by: Option<String>,
    ) -> AppResult<BillRun> {
        if !is_valid_region(region) {
            return Err(AppError::Validation(format!("Region '{}' is not valid", region)));
        }

        let mut tx = self.store.begin().await?;

        let mut bill_run = BillRun::new(regime.id, region, ruleset, created_by);
        let number = sequence::next_bill_run_number(&mut tx, regime.id, &bill_run.region).await?;
        bill_run.bill_run_number = Some(number);

        tx.insert_bill_run(&bill_run).await?;
        tx.commit().await?;

        info!(
            "Created {} bill run {} (number {}) for region {}",
            bill_run.ruleset, bill_run.id, number, bill_run.region
        );

        Ok(bill_run)
    }

    #[instrument(skip(self, regime), fields(regime = %regime.slug))]
    pub async fn find(&self, regime: &Regime, id: Uuid) -> AppResult<BillRun> {
        debug!("Finding bill run {}", id);
        let mut tx = self.store.begin().await?;
        find_scoped_bill_run(&mut tx, regime, id).await
    }

    /// Bill run with its invoices
    pub async fn view(&self, regime: &Regime, id: Uuid) -> AppResult<(BillRun, Vec<Invoice>)> {
        let mut tx = self.store.begin().await?;
        let bill_run = find_scoped_bill_run(&mut tx, regime, id).await?;
        let invoices = tx.list_invoices(id).await?;
        debug!("Bill run {} has {} invoices", id, invoices.len());

        Ok((bill_run, invoices))
    }

    /// Finalise the summary totals
    ///
    /// Fails with a data validation error when the bill run has no lines.
    #[instrument(skip(self, regime), fields(regime = %regime.slug))]
    pub async fn generate(&self, regime: &Regime, id: Uuid) -> AppResult<BillRun> {
        let mut tx = self.store.begin().await?;
        let mut bill_run = lock_scoped_bill_run(&mut tx, regime, id).await?;

        if bill_run.status.is_pending() {
            warn!("Bill run {} is pending; cannot generate", id);
            return Err(AppError::Conflict(format!(
                "Summary for bill run {} is already being updated.",
                id
            )));
        }

        if bill_run.status.is_generated() {
            warn!("Bill run {} already generated", id);
            return Err(AppError::Conflict(format!(
                "Summary for bill run {} has already been generated.",
                id
            )));
        }

        if bill_run.is_empty() {
            warn!("Bill run {} is empty; cannot generate", id);
            return Err(AppError::DataValidation(format!(
                "Summary for bill run {} cannot be generated because it has no transactions.",
                id
            )));
        }

        let mut invoices = tx.list_invoices(id).await?;
        for invoice in invoices.iter_mut() {
            let has_adjustment = tx.has_minimum_charge_adjustment(invoice.id).await?;
            let flags = compute_invoice_flags(&invoice.tallies, has_adjustment);

            if flags != invoice.flags {
                tx.set_invoice_flags(invoice.id, &flags).await?;
                invoice.flags = flags;
            }
        }

        let summary = generate_summary(&invoices);
        tx.set_bill_run_summary(id, &summary).await?;
        tx.update_bill_run_status(id, BillRunStatus::Generated).await?;
        tx.commit().await?;

        bill_run.summary = summary;
        bill_run.status = BillRunStatus::Generated;

        info!(
            "Generated bill run {}: {} invoices, {} credit notes",
            id, summary.invoice_count, summary.credit_note_count
        );

        Ok(bill_run)
    }

    #[instrument(skip(self, regime), fields(regime = %regime.slug))]
    pub async fn approve(&self, regime: &Regime, id: Uuid) -> AppResult<BillRun> {
        let mut tx = self.store.begin().await?;
        let mut bill_run = lock_scoped_bill_run(&mut tx, regime, id).await?;

        if bill_run.status != BillRunStatus::Generated {
            warn!("Bill run {} is {}; cannot approve", id, bill_run.status);
            return Err(AppError::Conflict(format!(
                "Bill run {} does not have a status of '{}'.",
                id,
                BillRunStatus::Generated
            )));
        }

        tx.update_bill_run_status(id, BillRunStatus::Approved).await?;
        tx.commit().await?;

        bill_run.status = BillRunStatus::Approved;
        info!("Approved bill run {}", id);

        Ok(bill_run)
    }

    /// Issue transaction references and the file reference
    ///
    /// The bill run is committed as `pending` before any reference is issued.
    /// If issuing fails, the references roll back and the bill run is returned
    /// to `approved`.
    #[instrument(skip(self, regime), fields(regime = %regime.slug))]
    pub async fn send(&self, regime: &Regime, id: Uuid) -> AppResult<BillRun> {
        {
            let mut tx = self.store.begin().await?;
            let bill_run = lock_scoped_bill_run(&mut tx, regime, id).await?;

            if bill_run.status != BillRunStatus::Approved {
                warn!("Bill run {} is {}; cannot send", id, bill_run.status);
                return Err(AppError::Conflict(format!(
                    "Bill run {} does not have a status of '{}'.",
                    id,
                    BillRunStatus::Approved
                )));
            }

            if !tx
                .update_bill_run_status_if(id, BillRunStatus::Approved, BillRunStatus::Pending)
                .await?
            {
                return Err(AppError::Conflict(format!("Bill run {} is already being sent.", id)));
            }
            tx.commit().await?;
        }

        match self.issue_references(regime, id).await {
            Ok(bill_run) => Ok(bill_run),
            Err(e) => {
                error!("Sending bill run {} failed: {}", id, e);

                let mut tx = self.store.begin().await?;
                tx.update_bill_run_status_if(id, BillRunStatus::Pending, BillRunStatus::Approved)
                    .await?;
                tx.commit().await?;

                Err(e)
            }
        }
    }

    async fn issue_references(&self, regime: &Regime, id: Uuid) -> AppResult<BillRun> {
        let mut tx = self.store.begin().await?;
        let mut bill_run = lock_scoped_bill_run(&mut tx, regime, id).await?;

        let mut referenced = 0;
        for invoice in tx.list_invoices(id).await? {
            if !invoice.awaiting_reference() {
                continue;
            }

            let reference = sequence::next_transaction_reference(
                &mut tx,
                regime.id,
                &bill_run.region,
                bill_run.ruleset,
                invoice.transaction_type(),
            )
            .await?;
            tx.set_invoice_transaction_reference(invoice.id, &reference).await?;
            debug!("Invoice {} referenced as {}", invoice.id, reference);
            referenced += 1;
        }

        if referenced > 0 {
            let file_reference = sequence::next_transaction_file_reference(
                &mut tx,
                regime.id,
                self.billing.file_prefix_for(&regime.slug),
                &bill_run.region,
                bill_run.ruleset,
            )
            .await?;

            tx.update_bill_run_status_with_file(id, BillRunStatus::Sending, Some(&file_reference))
                .await?;
            bill_run.status = BillRunStatus::Sending;
            bill_run.file_reference = Some(file_reference);
        } else {
            tx.update_bill_run_status(id, BillRunStatus::Initialised).await?;
            bill_run.status = BillRunStatus::Initialised;
        }

        tx.commit().await?;

        info!(
            "Sent bill run {}: {} invoices referenced, file {:?}",
            id, referenced, bill_run.file_reference
        );

        Ok(bill_run)
    }

    /// Record downstream confirmation of a sent bill run
    #[instrument(skip(self, regime), fields(regime = %regime.slug))]
    pub async fn mark_billed(&self, regime: &Regime, id: Uuid) -> AppResult<BillRun> {
        let mut tx = self.store.begin().await?;
        let mut bill_run = lock_scoped_bill_run(&mut tx, regime, id).await?;

        if !tx
            .update_bill_run_status_if(id, BillRunStatus::Sending, BillRunStatus::Billed)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "Bill run {} does not have a status of '{}'.",
                id,
                BillRunStatus::Sending
            )));
        }
        tx.commit().await?;

        bill_run.status = BillRunStatus::Billed;
        info!("Bill run {} billed", id);

        Ok(bill_run)
    }
}
