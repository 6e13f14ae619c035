//! Shared fixture for ledger service tests

#![allow(dead_code)]

use charge_core::config::BillingConfig;
use charge_core::models::{BillRun, BillRunStatus, Invoice, Licence, Regime, Ruleset};
use charge_core::traits::{BillRunRepository, InvoiceRepository, LedgerStore, LicenceRepository, UnitOfWork};
use charge_db::MemoryLedgerStore;
use charge_services::{LedgerServices, NewTransaction, RecordingNotifier};
use std::sync::Arc;
use uuid::Uuid;

pub struct Fixture {
    pub store: Arc<MemoryLedgerStore>,
    pub services: LedgerServices<MemoryLedgerStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub regime: Regime,
}

/// Store with one regime whose counters all start at zero
pub async fn fixture() -> Fixture {
    let store = Arc::new(MemoryLedgerStore::new());
    let regime = store.seed_regime("wrls", "Water Resources", 0).await;
    let notifier = Arc::new(RecordingNotifier::new());
    let services = LedgerServices::new(store.clone(), BillingConfig::default(), notifier.clone());

    Fixture {
        store,
        services,
        notifier,
        regime,
    }
}

/// Presroc charge for region A, financial year 2021
pub fn charge(customer: &str, licence: &str, value: i64, credit: bool) -> NewTransaction {
    NewTransaction {
        region: "A".to_string(),
        ruleset: Ruleset::Presroc,
        customer_reference: customer.to_string(),
        licence_number: licence.to_string(),
        financial_year: 2021,
        charge_value: value,
        charge_credit: credit,
        client_id: None,
        subject_to_minimum_charge: false,
        minimum_charge_adjustment: false,
    }
}

impl Fixture {
    pub async fn new_bill_run(&self) -> BillRun {
        self.services
            .bill_runs
            .create(&self.regime, "A", Ruleset::Presroc, Some("tester".to_string()))
            .await
            .unwrap()
    }

    pub async fn add(&self, bill_run_id: Uuid, transaction: NewTransaction) -> charge_core::models::Transaction {
        self.services
            .transactions
            .create_transaction(&self.regime, bill_run_id, transaction, None)
            .await
            .unwrap()
    }

    pub async fn bill_run(&self, id: Uuid) -> BillRun {
        self.services.bill_runs.find(&self.regime, id).await.unwrap()
    }

    pub async fn invoices(&self, bill_run_id: Uuid) -> Vec<Invoice> {
        let mut tx = self.store.begin().await.unwrap();
        tx.list_invoices(bill_run_id).await.unwrap()
    }

    pub async fn invoice(&self, id: Uuid) -> Option<Invoice> {
        let mut tx = self.store.begin().await.unwrap();
        tx.find_invoice(id).await.unwrap()
    }

    pub async fn licences(&self, invoice_id: Uuid) -> Vec<Licence> {
        let mut tx = self.store.begin().await.unwrap();
        tx.list_licences(invoice_id).await.unwrap()
    }

    /// Overwrite a bill run's status, as a concurrent operation would
    pub async fn set_status(&self, id: Uuid, status: BillRunStatus) {
        let mut tx = self.store.begin().await.unwrap();
        tx.update_bill_run_status(id, status).await.unwrap();
        tx.commit().await.unwrap();
    }

    /// Drive a bill run from initialised to billed
    pub async fn bill(&self, id: Uuid) -> BillRun {
        let bill_runs = &self.services.bill_runs;
        bill_runs.generate(&self.regime, id).await.unwrap();
        bill_runs.approve(&self.regime, id).await.unwrap();
        bill_runs.send(&self.regime, id).await.unwrap();
        bill_runs.mark_billed(&self.regime, id).await.unwrap()
    }
}
