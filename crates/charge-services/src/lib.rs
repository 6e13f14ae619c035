//! Ledger services for the charge ledger
//!
//! Services are structs generic over a [`LedgerStore`], holding their
//! dependencies behind `Arc`. Each public operation opens its own unit of
//! work, locks the bill run it touches and commits once.
//!
//! # Services
//!
//! - `RegimeService` - regime resolution from the request path
//! - `BillRunService` - creation and the status state machine
//! - `TransactionService` - transaction intake
//! - `DeletionService` - background invoice and licence deletion
//! - `RebillingService` - cancel/rebill invoice pairs
//! - `sequence` - counter issuers used inside a caller's unit of work

pub mod bill_run_service;
pub mod deletion;
pub mod notifier;
pub mod rebilling;
pub mod regime_service;
pub mod sequence;
pub mod tasks;
pub mod transaction_service;

pub use bill_run_service::BillRunService;
pub use deletion::DeletionService;
pub use notifier::{RecordingNotifier, TracingNotifier};
pub use rebilling::{RebilledInvoices, RebillingService};
pub use regime_service::RegimeService;
pub use tasks::TaskRunner;
pub use transaction_service::{NewTransaction, TransactionService};

use charge_core::{config::BillingConfig, traits::{LedgerStore, Notifier}};
use std::sync::Arc;

/// Every ledger service over one store
pub struct LedgerServices<S: LedgerStore> {
    pub regimes: RegimeService<S>,
    pub bill_runs: BillRunService<S>,
    pub transactions: TransactionService<S>,
    pub deletion: DeletionService<S>,
    pub rebilling: RebillingService<S>,
}

impl<S: LedgerStore> LedgerServices<S> {
    pub fn new(store: Arc<S>, billing: BillingConfig, notifier: Arc<dyn Notifier>) -> Self {
        let tasks = TaskRunner::new(notifier, billing.background_task_limit);

        Self {
            regimes: RegimeService::new(Arc::clone(&store)),
            bill_runs: BillRunService::new(Arc::clone(&store), billing),
            transactions: TransactionService::new(Arc::clone(&store)),
            deletion: DeletionService::new(Arc::clone(&store), tasks.clone()),
            rebilling: RebillingService::new(store, tasks),
        }
    }
}
