//! Invoice rebilling
//!
//! Rebilling a billed invoice raises two invoices on an editable bill run: a
//! cancel invoice (C) that reverses the original and a rebill invoice (R) that
//! reissues it. Both are created before the request returns; their licences
//! and transactions are copied by a background task.
//!
//! The target bill run is held `pending` until the copy finishes, so it cannot
//! be generated with half-copied invoices.

use crate::bill_run_service::lock_scoped_bill_run;
use crate::tasks::TaskRunner;
use charge_core::{
    ledger::TallyPatch,
    models::{BillRunStatus, Invoice, LineTallies, RebilledType, Regime},
    traits::{
        BillRunRepository, InvoiceRepository, LedgerStore, LicenceRepository, TransactionRepository,
        UnitOfWork,
    },
    AppError, AppResult,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Invoices raised by a rebill request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebilledInvoices {
    pub cancel_invoice: Invoice,
    pub rebill_invoice: Invoice,
}

pub struct RebillingService<S: LedgerStore> {
    store: Arc<S>,
    tasks: TaskRunner,
}

impl<S: LedgerStore> RebillingService<S> {
    pub fn new(store: Arc<S>, tasks: TaskRunner) -> Self {
        Self { store, tasks }
    }

    /// Raise cancel and rebill invoices for `invoice_id` on `bill_run_id`
    ///
    /// Returns the two new invoices and the handle of the copy task.
    #[instrument(skip(self, regime), fields(regime = %regime.slug))]
    pub async fn rebill_invoice(
        &self,
        regime: &Regime,
        bill_run_id: Uuid,
        invoice_id: Uuid,
        created_by: Option<String>,
    ) -> AppResult<(RebilledInvoices, JoinHandle<()>)> {
        let rebilled = {
            let mut tx = self.store.begin().await?;
            let target = lock_scoped_bill_run(&mut tx, regime, bill_run_id).await?;

            let original = tx
                .find_invoice(invoice_id)
                .await?
                .ok_or_else(|| AppError::InvoiceNotFound(invoice_id.to_string()))?;
            let source = tx
                .find_bill_run(original.bill_run_id)
                .await?
                .filter(|b| b.regime_id == regime.id)
                .ok_or_else(|| AppError::InvoiceNotFound(invoice_id.to_string()))?;

            if original.bill_run_id == target.id {
                return Err(AppError::Conflict(format!(
                    "Invoice {} is already on bill run {}.",
                    invoice_id, bill_run_id
                )));
            }

            if tx.find_rebilling_invoice(original.id).await?.is_some() {
                return Err(AppError::Conflict(format!(
                    "Invoice {} has already been rebilled.",
                    invoice_id
                )));
            }

            if source.status != BillRunStatus::Billed {
                return Err(AppError::Conflict(format!(
                    "Invoice {} is on bill run {} which has status {}; only billed invoices can be rebilled.",
                    invoice_id, source.id, source.status
                )));
            }

            if !source.region.eq_ignore_ascii_case(&target.region) {
                return Err(AppError::Conflict(format!(
                    "Invoice {} is for region {} but bill run {} is for region {}.",
                    invoice_id, source.region, bill_run_id, target.region
                )));
            }

            if source.ruleset != target.ruleset {
                return Err(AppError::Conflict(format!(
                    "Invoice {} is for ruleset {} but bill run {} is for ruleset {}.",
                    invoice_id, source.ruleset, bill_run_id, target.ruleset
                )));
            }

            if original.rebilled_type == RebilledType::Cancel {
                return Err(AppError::Conflict(format!(
                    "Invoice {} is a cancel invoice and cannot be rebilled.",
                    invoice_id
                )));
            }

            target.ensure_editable()?;

            let cancel_invoice = Invoice::rebilling_of(target.id, &original, RebilledType::Cancel);
            let rebill_invoice = Invoice::rebilling_of(target.id, &original, RebilledType::Rebill);
            tx.insert_invoice(&cancel_invoice).await?;
            tx.insert_invoice(&rebill_invoice).await?;
            tx.update_bill_run_status(target.id, BillRunStatus::Pending).await?;
            tx.commit().await?;

            info!(
                "Raised cancel invoice {} and rebill invoice {} for invoice {}",
                cancel_invoice.id, rebill_invoice.id, invoice_id
            );

            RebilledInvoices {
                cancel_invoice,
                rebill_invoice,
            }
        };

        let store = Arc::clone(&self.store);
        let cancel_id = rebilled.cancel_invoice.id;
        let rebill_id = rebilled.rebill_invoice.id;

        let handle = self.tasks.submit(
            "rebill_invoice",
            json!({
                "billRunId": bill_run_id,
                "invoiceId": invoice_id,
                "cancelInvoiceId": cancel_id,
                "rebillInvoiceId": rebill_id,
            }),
            async move {
                let result = Self::copy_licences(
                    Arc::clone(&store),
                    bill_run_id,
                    invoice_id,
                    cancel_id,
                    rebill_id,
                    created_by,
                )
                .await;

                if result.is_err() {
                    // The failed copy left the target pending
                    let mut tx = store.begin().await?;
                    tx.update_bill_run_status_if(bill_run_id, BillRunStatus::Pending, BillRunStatus::Initialised)
                        .await?;
                    tx.commit().await?;
                }

                result
            },
        );

        Ok((rebilled, handle))
    }

    /// Mirror the original invoice's licences and transactions onto the new invoices
    async fn copy_licences(
        store: Arc<S>,
        bill_run_id: Uuid,
        original_id: Uuid,
        cancel_id: Uuid,
        rebill_id: Uuid,
        created_by: Option<String>,
    ) -> AppResult<()> {
        let mut tx = store.begin().await?;
        let target = tx
            .lock_bill_run(bill_run_id)
            .await?
            .ok_or_else(|| AppError::BillRunNotFound(bill_run_id.to_string()))?;

        if !target.status.is_pending() {
            return Err(AppError::InvalidState(format!(
                "Bill run {} has status {} instead of being held for rebilling.",
                bill_run_id, target.status
            )));
        }

        let mut bill_run_lines = LineTallies::default();

        for (invoice_id, invert) in [(rebill_id, false), (cancel_id, true)] {
            let mut invoice_lines = LineTallies::default();

            for licence in tx.list_licences(original_id).await? {
                let mirrored = licence.mirrored_on(bill_run_id, invoice_id);
                tx.insert_licence(&mirrored).await?;

                let mut licence_lines = LineTallies::default();
                for transaction in tx.list_transactions_for_licence(licence.id).await? {
                    let copy =
                        transaction.rebill_copy(bill_run_id, invoice_id, mirrored.id, invert, created_by.clone());
                    licence_lines += copy.tallies();
                    tx.insert_transaction(&copy).await?;
                }

                tx.apply_licence_patch(mirrored.id, &licence_lines).await?;
                invoice_lines += licence_lines;
                debug!("Copied licence {} onto invoice {}", licence.licence_number, invoice_id);
            }

            tx.apply_invoice_patch(invoice_id, &invoice_lines).await?;
            bill_run_lines += invoice_lines;
        }

        if bill_run_lines.is_zero() {
            warn!("Invoice {} had no transactions to rebill", original_id);
        }

        tx.apply_bill_run_patch(bill_run_id, &TallyPatch::lines(bill_run_lines))
            .await?;
        tx.update_bill_run_status_if(bill_run_id, BillRunStatus::Pending, BillRunStatus::Initialised)
            .await?;
        tx.commit().await?;

        info!("Rebilled invoice {} onto bill run {}", original_id, bill_run_id);
        Ok(())
    }
}
