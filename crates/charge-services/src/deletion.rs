//! Invoice and licence deletion
//!
//! Requests are validated synchronously and the deletion itself runs as a
//! background task. Each task owns one unit of work; a failure rolls it back
//! and is reported through the task runner's notifier.
//!
//! Neither deletion runs against a `pending` bill run: the summary adjustment
//! depends on the status the pending state is hiding.

use crate::bill_run_service::{find_scoped_bill_run, lock_scoped_bill_run};
use crate::tasks::TaskRunner;
use charge_core::{
    ledger::{delete_invoice_patch, remove_licence},
    models::{BillRun, BillRunStatus, Regime},
    traits::{BillRunRepository, InvoiceRepository, LedgerStore, LicenceRepository, UnitOfWork},
    AppError, AppResult,
};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Refuse ledger changes while another operation holds the bill run
fn ensure_not_pending(bill_run: &BillRun) -> AppResult<()> {
    if bill_run.status.is_pending() {
        warn!("Bill run {} is pending; refusing deletion", bill_run.id);
        return Err(AppError::Conflict(format!(
            "Bill run {} is being updated and cannot be changed until it finishes.",
            bill_run.id
        )));
    }
    Ok(())
}

pub struct DeletionService<S: LedgerStore> {
    store: Arc<S>,
    tasks: TaskRunner,
}

impl<S: LedgerStore> DeletionService<S> {
    pub fn new(store: Arc<S>, tasks: TaskRunner) -> Self {
        Self { store, tasks }
    }

    /// Validate and schedule deletion of an invoice
    #[instrument(skip(self, regime), fields(regime = %regime.slug))]
    pub async fn delete_invoice(
        &self,
        regime: &Regime,
        bill_run_id: Uuid,
        invoice_id: Uuid,
    ) -> AppResult<JoinHandle<()>> {
        {
            let mut tx = self.store.begin().await?;
            let bill_run = find_scoped_bill_run(&mut tx, regime, bill_run_id).await?;

            match tx.find_invoice(invoice_id).await? {
                Some(invoice) if invoice.bill_run_id == bill_run_id => {}
                Some(_) => {
                    return Err(AppError::Conflict(format!(
                        "Invoice {} is not linked to bill run {}.",
                        invoice_id, bill_run_id
                    )))
                }
                None => return Err(AppError::InvoiceNotFound(invoice_id.to_string())),
            }

            ensure_not_pending(&bill_run)?;
        }

        let store = Arc::clone(&self.store);
        Ok(self.tasks.submit(
            "delete_invoice",
            json!({ "billRunId": bill_run_id, "invoiceId": invoice_id }),
            async move { Self::remove_invoice(store, bill_run_id, invoice_id).await },
        ))
    }

    async fn remove_invoice(store: Arc<S>, bill_run_id: Uuid, invoice_id: Uuid) -> AppResult<()> {
        let mut tx = store.begin().await?;
        let bill_run = tx
            .lock_bill_run(bill_run_id)
            .await?
            .ok_or_else(|| AppError::BillRunNotFound(bill_run_id.to_string()))?;
        ensure_not_pending(&bill_run)?;

        let Some(invoice) = tx.find_invoice(invoice_id).await? else {
            debug!("Invoice {} already deleted", invoice_id);
            return Ok(());
        };

        tx.delete_invoice(invoice_id).await?;
        tx.apply_bill_run_patch(bill_run_id, &delete_invoice_patch(bill_run.status, &invoice))
            .await?;

        if tx.mark_bill_run_initialised_if_empty(bill_run_id).await? {
            info!("Bill run {} is now empty and back to initialised", bill_run_id);
        }

        tx.commit().await?;
        info!("Deleted invoice {} from bill run {}", invoice_id, bill_run_id);

        Ok(())
    }

    /// Validate and schedule deletion of a licence
    ///
    /// The bill run is marked `pending` before this returns and restored when
    /// the background work finishes, unless something else has moved it on.
    #[instrument(skip(self, regime), fields(regime = %regime.slug))]
    pub async fn delete_licence(
        &self,
        regime: &Regime,
        bill_run_id: Uuid,
        licence_id: Uuid,
    ) -> AppResult<JoinHandle<()>> {
        let original_status = {
            let mut tx = self.store.begin().await?;
            let bill_run = lock_scoped_bill_run(&mut tx, regime, bill_run_id).await?;

            match tx.find_licence(licence_id).await? {
                Some(licence) if licence.bill_run_id == bill_run_id => {}
                Some(_) => {
                    return Err(AppError::Conflict(format!(
                        "Licence {} is not linked to bill run {}.",
                        licence_id, bill_run_id
                    )))
                }
                None => return Err(AppError::LicenceNotFound(licence_id.to_string())),
            }

            ensure_not_pending(&bill_run)?;

            tx.update_bill_run_status(bill_run_id, BillRunStatus::Pending).await?;
            tx.commit().await?;
            bill_run.status
        };

        let store = Arc::clone(&self.store);
        Ok(self.tasks.submit(
            "delete_licence",
            json!({ "billRunId": bill_run_id, "licenceId": licence_id }),
            async move {
                let result =
                    Self::remove_licence(Arc::clone(&store), bill_run_id, licence_id, original_status).await;

                if result.is_err() {
                    // The failed unit of work left the bill run pending
                    let mut tx = store.begin().await?;
                    tx.update_bill_run_status_if(bill_run_id, BillRunStatus::Pending, original_status)
                        .await?;
                    tx.commit().await?;
                }

                result
            },
        ))
    }

    async fn remove_licence(
        store: Arc<S>,
        bill_run_id: Uuid,
        licence_id: Uuid,
        original_status: BillRunStatus,
    ) -> AppResult<()> {
        let mut tx = store.begin().await?;
        tx.lock_bill_run(bill_run_id)
            .await?
            .ok_or_else(|| AppError::BillRunNotFound(bill_run_id.to_string()))?;

        if let Some(licence) = tx.find_licence(licence_id).await? {
            let invoice = tx.find_invoice(licence.invoice_id).await?.ok_or_else(|| {
                error!("Licence {} has no invoice {}", licence_id, licence.invoice_id);
                AppError::InvoiceNotFound(licence.invoice_id.to_string())
            })?;

            tx.delete_licence(licence_id).await?;
            let has_adjustment = tx.has_minimum_charge_adjustment(invoice.id).await?;
            let removal = remove_licence(original_status.is_generated(), &invoice, &licence, has_adjustment);

            tx.apply_invoice_patch(invoice.id, &removal.invoice_lines).await?;
            tx.set_invoice_flags(invoice.id, &removal.invoice_flags).await?;
            tx.apply_bill_run_patch(bill_run_id, &removal.bill_run).await?;

            if removal.invoice_now_empty {
                tx.delete_invoice(invoice.id).await?;
                debug!("Deleted invoice {} with its last licence", invoice.id);
                tx.mark_bill_run_initialised_if_empty(bill_run_id).await?;
            }

            info!("Deleted licence {} from bill run {}", licence_id, bill_run_id);
        } else {
            debug!("Licence {} already deleted", licence_id);
        }

        tx.update_bill_run_status_if(bill_run_id, BillRunStatus::Pending, original_status)
            .await?;
        tx.commit().await?;

        Ok(())
    }
}
