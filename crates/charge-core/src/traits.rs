//! Storage and notification abstractions
//!
//! Every ledger mutation runs inside a unit of work obtained from a
//! [`LedgerStore`]. The unit of work implements all repository traits, so a
//! service can read, lock and patch several tables and then commit once.
//! Dropping a unit of work without committing rolls it back.

use crate::error::AppError;
use crate::ledger::TallyPatch;
use crate::models::{
    BillRun, BillRunStatus, CounterField, Invoice, InvoiceFlags, Licence, LineTallies, Regime,
    SummaryTallies, Transaction,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Regime lookups
#[async_trait]
pub trait RegimeRepository: Send {
    async fn find_regime(&mut self, id: Uuid) -> Result<Option<Regime>, AppError>;

    async fn find_regime_by_slug(&mut self, slug: &str) -> Result<Option<Regime>, AppError>;
}

/// Per (regime, region) counters
#[async_trait]
pub trait SequenceCounterRepository: Send {
    /// Atomically increment `field` and return the new value
    ///
    /// Returns `None` when no counter row exists for the pair; no row is created.
    async fn increment_counter(
        &mut self,
        regime_id: Uuid,
        region: &str,
        field: CounterField,
    ) -> Result<Option<i64>, AppError>;
}

#[async_trait]
pub trait BillRunRepository: Send {
    async fn find_bill_run(&mut self, id: Uuid) -> Result<Option<BillRun>, AppError>;

    /// Fetch and lock the bill run row until the unit of work ends
    async fn lock_bill_run(&mut self, id: Uuid) -> Result<Option<BillRun>, AppError>;

    async fn insert_bill_run(&mut self, bill_run: &BillRun) -> Result<(), AppError>;

    /// Add a patch to the stored line (and optionally summary) tallies
    async fn apply_bill_run_patch(&mut self, id: Uuid, patch: &TallyPatch) -> Result<(), AppError>;

    async fn update_bill_run_status(&mut self, id: Uuid, status: BillRunStatus) -> Result<(), AppError>;

    /// Move to `status` only if the stored status is `expected`
    async fn update_bill_run_status_if(
        &mut self,
        id: Uuid,
        expected: BillRunStatus,
        status: BillRunStatus,
    ) -> Result<bool, AppError>;

    /// Reset to initialised only if the bill run no longer has any invoice
    async fn mark_bill_run_initialised_if_empty(&mut self, id: Uuid) -> Result<bool, AppError>;

    async fn set_bill_run_summary(&mut self, id: Uuid, summary: &SummaryTallies) -> Result<(), AppError>;

    async fn update_bill_run_status_with_file(
        &mut self,
        id: Uuid,
        status: BillRunStatus,
        file_reference: Option<&str>,
    ) -> Result<(), AppError>;
}

#[async_trait]
pub trait InvoiceRepository: Send {
    async fn find_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>, AppError>;

    /// Original (not rebilling) invoice for a customer and financial year
    async fn find_original_invoice(
        &mut self,
        bill_run_id: Uuid,
        customer_reference: &str,
        financial_year: i32,
    ) -> Result<Option<Invoice>, AppError>;

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), AppError>;

    async fn list_invoices(&mut self, bill_run_id: Uuid) -> Result<Vec<Invoice>, AppError>;

    async fn apply_invoice_patch(&mut self, id: Uuid, lines: &LineTallies) -> Result<(), AppError>;

    async fn set_invoice_flags(&mut self, id: Uuid, flags: &InvoiceFlags) -> Result<(), AppError>;

    async fn set_invoice_transaction_reference(
        &mut self,
        id: Uuid,
        transaction_reference: &str,
    ) -> Result<(), AppError>;

    /// Delete the invoice with its licences and transactions
    async fn delete_invoice(&mut self, id: Uuid) -> Result<bool, AppError>;

    /// Cancel invoice raised against `original_id`, if it has been rebilled
    async fn find_rebilling_invoice(&mut self, original_id: Uuid) -> Result<Option<Invoice>, AppError>;

    /// Whether any remaining transaction on the invoice is a minimum charge adjustment
    async fn has_minimum_charge_adjustment(&mut self, invoice_id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait LicenceRepository: Send {
    async fn find_licence(&mut self, id: Uuid) -> Result<Option<Licence>, AppError>;

    async fn find_licence_by_number(
        &mut self,
        invoice_id: Uuid,
        licence_number: &str,
    ) -> Result<Option<Licence>, AppError>;

    async fn insert_licence(&mut self, licence: &Licence) -> Result<(), AppError>;

    async fn list_licences(&mut self, invoice_id: Uuid) -> Result<Vec<Licence>, AppError>;

    async fn apply_licence_patch(&mut self, id: Uuid, lines: &LineTallies) -> Result<(), AppError>;

    /// Delete the licence with its transactions
    async fn delete_licence(&mut self, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait TransactionRepository: Send {
    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), AppError>;

    async fn list_transactions_for_licence(&mut self, licence_id: Uuid) -> Result<Vec<Transaction>, AppError>;

    async fn client_id_exists(&mut self, regime_id: Uuid, client_id: &str) -> Result<bool, AppError>;
}

/// One atomic unit of work over the ledger tables
#[async_trait]
pub trait UnitOfWork:
    RegimeRepository
    + SequenceCounterRepository
    + BillRunRepository
    + InvoiceRepository
    + LicenceRepository
    + TransactionRepository
    + Send
    + Sized
{
    async fn commit(self) -> Result<(), AppError>;
}

/// Source of units of work
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    type Tx: UnitOfWork + 'static;

    async fn begin(&self) -> Result<Self::Tx, AppError>;
}

/// Destination for operational messages from background work
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);

    fn error(&self, message: &str, context: serde_json::Value);
}
