//! In-memory ledger store
//!
//! Units of work are fully serialized: `begin` takes an owned lock on the
//! shared state and works on a copy, `commit` writes the copy back. Dropping a
//! unit of work releases the lock and discards its changes, which gives the
//! same rollback semantics as the PostgreSQL store.

use async_trait::async_trait;
use charge_core::{
    ledger::TallyPatch,
    models::{
        BillRun, BillRunStatus, CounterField, Invoice, InvoiceFlags, Licence, LineTallies,
        RebilledType, Regime, SequenceCounter, SummaryTallies, Transaction, REGIONS,
    },
    traits::{
        BillRunRepository, InvoiceRepository, LedgerStore, LicenceRepository, RegimeRepository,
        SequenceCounterRepository, TransactionRepository, UnitOfWork,
    },
    AppError, AppResult,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    regimes: BTreeMap<Uuid, Regime>,
    counters: BTreeMap<(Uuid, String), SequenceCounter>,
    bill_runs: BTreeMap<Uuid, BillRun>,
    invoices: BTreeMap<Uuid, Invoice>,
    licences: BTreeMap<Uuid, Licence>,
    transactions: BTreeMap<Uuid, Transaction>,
}

/// Serialized in-memory ledger store
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a regime with a counter row for every region, all sequences starting at `seed`
    pub async fn seed_regime(&self, slug: &str, name: &str, seed: i64) -> Regime {
        let regime = Regime::new(slug, name);
        let mut state = self.state.lock().await;

        for region in REGIONS {
            let counter = SequenceCounter::seeded(regime.id, region, seed);
            state.counters.insert((regime.id, counter.region.clone()), counter);
        }
        state.regimes.insert(regime.id, regime.clone());

        regime
    }

    /// Add a regime without any counter rows
    pub async fn insert_regime(&self, regime: Regime) {
        self.state.lock().await.regimes.insert(regime.id, regime);
    }

    /// Add or replace a single counter row
    pub async fn insert_counter(&self, counter: SequenceCounter) {
        self.state
            .lock()
            .await
            .counters
            .insert((counter.regime_id, counter.region.clone()), counter);
    }

    /// Current value of a counter field, if the row exists
    pub async fn counter_value(&self, regime_id: Uuid, region: &str, field: CounterField) -> Option<i64> {
        self.state
            .lock()
            .await
            .counters
            .get(&(regime_id, region.to_uppercase()))
            .map(|c| c.value(field))
    }

    /// Number of transactions currently stored for a bill run
    pub async fn transaction_count(&self, bill_run_id: Uuid) -> usize {
        self.state
            .lock()
            .await
            .transactions
            .values()
            .filter(|t| t.bill_run_id == bill_run_id)
            .count()
    }
}

/// Unit of work over a private copy of the store
pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Tx = MemoryLedgerTx;

    async fn begin(&self) -> AppResult<MemoryLedgerTx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryLedgerTx { guard, working })
    }
}

#[async_trait]
impl UnitOfWork for MemoryLedgerTx {
    async fn commit(self) -> AppResult<()> {
        let MemoryLedgerTx { mut guard, working } = self;
        *guard = working;
        debug!("In-memory unit of work committed");
        Ok(())
    }
}

fn add_lines(target: &mut LineTallies, updated_at: &mut chrono::DateTime<Utc>, lines: &LineTallies) {
    *target += *lines;
    *updated_at = Utc::now();
}

#[async_trait]
impl RegimeRepository for MemoryLedgerTx {
    async fn find_regime(&mut self, id: Uuid) -> AppResult<Option<Regime>> {
        Ok(self.working.regimes.get(&id).cloned())
    }

    async fn find_regime_by_slug(&mut self, slug: &str) -> AppResult<Option<Regime>> {
        Ok(self
            .working
            .regimes
            .values()
            .find(|r| r.slug.eq_ignore_ascii_case(slug))
            .cloned())
    }
}

#[async_trait]
impl SequenceCounterRepository for MemoryLedgerTx {
    #[instrument(skip(self))]
    async fn increment_counter(
        &mut self,
        regime_id: Uuid,
        region: &str,
        field: CounterField,
    ) -> AppResult<Option<i64>> {
        Ok(self
            .working
            .counters
            .get_mut(&(regime_id, region.to_uppercase()))
            .map(|counter| counter.increment(field)))
    }
}

#[async_trait]
impl BillRunRepository for MemoryLedgerTx {
    async fn find_bill_run(&mut self, id: Uuid) -> AppResult<Option<BillRun>> {
        Ok(self.working.bill_runs.get(&id).cloned())
    }

    async fn lock_bill_run(&mut self, id: Uuid) -> AppResult<Option<BillRun>> {
        // Already exclusive for the lifetime of the unit of work
        Ok(self.working.bill_runs.get(&id).cloned())
    }

    async fn insert_bill_run(&mut self, bill_run: &BillRun) -> AppResult<()> {
        self.working.bill_runs.insert(bill_run.id, bill_run.clone());
        Ok(())
    }

    async fn apply_bill_run_patch(&mut self, id: Uuid, patch: &TallyPatch) -> AppResult<()> {
        let bill_run = self
            .working
            .bill_runs
            .get_mut(&id)
            .ok_or_else(|| AppError::BillRunNotFound(id.to_string()))?;

        add_lines(&mut bill_run.tallies, &mut bill_run.updated_at, &patch.lines);
        if let Some(summary) = patch.summary {
            bill_run.summary += summary;
        }
        Ok(())
    }

    async fn update_bill_run_status(&mut self, id: Uuid, status: BillRunStatus) -> AppResult<()> {
        let bill_run = self
            .working
            .bill_runs
            .get_mut(&id)
            .ok_or_else(|| AppError::BillRunNotFound(id.to_string()))?;

        bill_run.status = status;
        bill_run.updated_at = Utc::now();
        Ok(())
    }

    async fn update_bill_run_status_if(
        &mut self,
        id: Uuid,
        expected: BillRunStatus,
        status: BillRunStatus,
    ) -> AppResult<bool> {
        match self.working.bill_runs.get_mut(&id) {
            Some(bill_run) if bill_run.status == expected => {
                bill_run.status = status;
                bill_run.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_bill_run_initialised_if_empty(&mut self, id: Uuid) -> AppResult<bool> {
        if self.working.invoices.values().any(|i| i.bill_run_id == id) {
            return Ok(false);
        }

        match self.working.bill_runs.get_mut(&id) {
            Some(bill_run) => {
                bill_run.status = BillRunStatus::Initialised;
                bill_run.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_bill_run_summary(&mut self, id: Uuid, summary: &SummaryTallies) -> AppResult<()> {
        if let Some(bill_run) = self.working.bill_runs.get_mut(&id) {
            bill_run.summary = *summary;
            bill_run.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_bill_run_status_with_file(
        &mut self,
        id: Uuid,
        status: BillRunStatus,
        file_reference: Option<&str>,
    ) -> AppResult<()> {
        if let Some(bill_run) = self.working.bill_runs.get_mut(&id) {
            bill_run.status = status;
            bill_run.file_reference = file_reference.map(str::to_string);
            bill_run.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl InvoiceRepository for MemoryLedgerTx {
    async fn find_invoice(&mut self, id: Uuid) -> AppResult<Option<Invoice>> {
        Ok(self.working.invoices.get(&id).cloned())
    }

    async fn find_original_invoice(
        &mut self,
        bill_run_id: Uuid,
        customer_reference: &str,
        financial_year: i32,
    ) -> AppResult<Option<Invoice>> {
        let customer_reference = customer_reference.to_uppercase();
        Ok(self
            .working
            .invoices
            .values()
            .find(|i| {
                i.bill_run_id == bill_run_id
                    && i.customer_reference == customer_reference
                    && i.financial_year == financial_year
                    && i.rebilled_type == RebilledType::Original
                    && i.rebilled_invoice_id.is_none()
            })
            .cloned())
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> AppResult<()> {
        let duplicate = self.working.invoices.values().any(|i| {
            i.bill_run_id == invoice.bill_run_id
                && i.customer_reference == invoice.customer_reference
                && i.financial_year == invoice.financial_year
                && i.rebilled_type == invoice.rebilled_type
                && i.rebilled_invoice_id == invoice.rebilled_invoice_id
        });
        if duplicate {
            return Err(AppError::Conflict(format!(
                "Invoice for {} in financial year {} already exists",
                invoice.customer_reference, invoice.financial_year
            )));
        }

        self.working.invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn list_invoices(&mut self, bill_run_id: Uuid) -> AppResult<Vec<Invoice>> {
        Ok(self
            .working
            .invoices
            .values()
            .filter(|i| i.bill_run_id == bill_run_id)
            .cloned()
            .collect())
    }

    async fn apply_invoice_patch(&mut self, id: Uuid, lines: &LineTallies) -> AppResult<()> {
        let invoice = self
            .working
            .invoices
            .get_mut(&id)
            .ok_or_else(|| AppError::InvoiceNotFound(id.to_string()))?;

        add_lines(&mut invoice.tallies, &mut invoice.updated_at, lines);
        Ok(())
    }

    async fn set_invoice_flags(&mut self, id: Uuid, flags: &InvoiceFlags) -> AppResult<()> {
        if let Some(invoice) = self.working.invoices.get_mut(&id) {
            invoice.flags = *flags;
            invoice.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_invoice_transaction_reference(
        &mut self,
        id: Uuid,
        transaction_reference: &str,
    ) -> AppResult<()> {
        if let Some(invoice) = self.working.invoices.get_mut(&id) {
            invoice.transaction_reference = Some(transaction_reference.to_string());
            invoice.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_invoice(&mut self, id: Uuid) -> AppResult<bool> {
        self.working.transactions.retain(|_, t| t.invoice_id != id);
        self.working.licences.retain(|_, l| l.invoice_id != id);
        Ok(self.working.invoices.remove(&id).is_some())
    }

    async fn find_rebilling_invoice(&mut self, original_id: Uuid) -> AppResult<Option<Invoice>> {
        Ok(self
            .working
            .invoices
            .values()
            .find(|i| {
                i.rebilled_invoice_id == Some(original_id) && i.rebilled_type == RebilledType::Cancel
            })
            .cloned())
    }

    async fn has_minimum_charge_adjustment(&mut self, invoice_id: Uuid) -> AppResult<bool> {
        Ok(self
            .working
            .transactions
            .values()
            .any(|t| t.invoice_id == invoice_id && t.minimum_charge_adjustment))
    }
}

#[async_trait]
impl LicenceRepository for MemoryLedgerTx {
    async fn find_licence(&mut self, id: Uuid) -> AppResult<Option<Licence>> {
        Ok(self.working.licences.get(&id).cloned())
    }

    async fn find_licence_by_number(
        &mut self,
        invoice_id: Uuid,
        licence_number: &str,
    ) -> AppResult<Option<Licence>> {
        Ok(self
            .working
            .licences
            .values()
            .find(|l| l.invoice_id == invoice_id && l.licence_number == licence_number)
            .cloned())
    }

    async fn insert_licence(&mut self, licence: &Licence) -> AppResult<()> {
        self.working.licences.insert(licence.id, licence.clone());
        Ok(())
    }

    async fn list_licences(&mut self, invoice_id: Uuid) -> AppResult<Vec<Licence>> {
        Ok(self
            .working
            .licences
            .values()
            .filter(|l| l.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    async fn apply_licence_patch(&mut self, id: Uuid, lines: &LineTallies) -> AppResult<()> {
        let licence = self
            .working
            .licences
            .get_mut(&id)
            .ok_or_else(|| AppError::LicenceNotFound(id.to_string()))?;

        add_lines(&mut licence.tallies, &mut licence.updated_at, lines);
        Ok(())
    }

    async fn delete_licence(&mut self, id: Uuid) -> AppResult<bool> {
        self.working.transactions.retain(|_, t| t.licence_id != id);
        Ok(self.working.licences.remove(&id).is_some())
    }
}

#[async_trait]
impl TransactionRepository for MemoryLedgerTx {
    async fn insert_transaction(&mut self, transaction: &Transaction) -> AppResult<()> {
        self.working
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(())
    }

    async fn list_transactions_for_licence(&mut self, licence_id: Uuid) -> AppResult<Vec<Transaction>> {
        Ok(self
            .working
            .transactions
            .values()
            .filter(|t| t.licence_id == licence_id)
            .cloned()
            .collect())
    }

    async fn client_id_exists(&mut self, regime_id: Uuid, client_id: &str) -> AppResult<bool> {
        Ok(self
            .working
            .transactions
            .values()
            .any(|t| t.regime_id == regime_id && t.client_id.as_deref() == Some(client_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charge_core::models::Ruleset;

    #[tokio::test]
    async fn test_commit_persists_changes() {
        let store = MemoryLedgerStore::new();
        let regime = store.seed_regime("wrls", "Water", 0).await;
        let bill_run = BillRun::new(regime.id, "A", Ruleset::Presroc, None);

        let mut tx = store.begin().await.unwrap();
        tx.insert_bill_run(&bill_run).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_bill_run(bill_run.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let store = MemoryLedgerStore::new();
        let regime = store.seed_regime("wrls", "Water", 10).await;

        {
            let mut tx = store.begin().await.unwrap();
            let value = tx
                .increment_counter(regime.id, "A", CounterField::BillRunNumber)
                .await
                .unwrap();
            assert_eq!(value, Some(11));
        }

        assert_eq!(
            store.counter_value(regime.id, "A", CounterField::BillRunNumber).await,
            Some(10)
        );
    }

    #[tokio::test]
    async fn test_missing_counter_is_not_created() {
        let store = MemoryLedgerStore::new();
        let regime = Regime::new("cfd", "Discharges");
        store.insert_regime(regime.clone()).await;

        let mut tx = store.begin().await.unwrap();
        let value = tx
            .increment_counter(regime.id, "A", CounterField::BillRunNumber)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(value, None);
        assert_eq!(
            store.counter_value(regime.id, "A", CounterField::BillRunNumber).await,
            None
        );
    }

    #[tokio::test]
    async fn test_conditional_reset_requires_no_invoices() {
        let store = MemoryLedgerStore::new();
        let regime = store.seed_regime("wrls", "Water", 0).await;
        let mut bill_run = BillRun::new(regime.id, "A", Ruleset::Presroc, None);
        bill_run.status = BillRunStatus::Generated;
        let invoice = Invoice::new(bill_run.id, "CUST1", 2021);

        let mut tx = store.begin().await.unwrap();
        tx.insert_bill_run(&bill_run).await.unwrap();
        tx.insert_invoice(&invoice).await.unwrap();
        assert!(!tx.mark_bill_run_initialised_if_empty(bill_run.id).await.unwrap());

        tx.delete_invoice(invoice.id).await.unwrap();
        assert!(tx.mark_bill_run_initialised_if_empty(bill_run.id).await.unwrap());
        let reset = tx.find_bill_run(bill_run.id).await.unwrap().unwrap();
        assert_eq!(reset.status, BillRunStatus::Initialised);
    }

    #[tokio::test]
    async fn test_duplicate_invoice_key_conflicts() {
        let store = MemoryLedgerStore::new();
        let bill_run_id = Uuid::now_v7();

        let mut tx = store.begin().await.unwrap();
        tx.insert_invoice(&Invoice::new(bill_run_id, "cust1", 2021)).await.unwrap();
        let result = tx.insert_invoice(&Invoice::new(bill_run_id, "CUST1", 2021)).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
