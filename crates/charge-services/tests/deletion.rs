mod common;

use charge_core::models::BillRunStatus;
use charge_core::AppError;
use common::{charge, fixture};
use charge_services::NewTransaction;
use uuid::Uuid;

#[tokio::test]
async fn test_deleting_last_invoice_resets_bill_run() {
    let f = fixture().await;
    let bill_run = f.new_bill_run().await;
    let transaction = f.add(bill_run.id, charge("CUST1", "LIC/1", 1000, false)).await;
    f.services.bill_runs.generate(&f.regime, bill_run.id).await.unwrap();

    let handle = f
        .services
        .deletion
        .delete_invoice(&f.regime, bill_run.id, transaction.invoice_id)
        .await
        .unwrap();
    handle.await.unwrap();

    let stored = f.bill_run(bill_run.id).await;
    assert_eq!(stored.status, BillRunStatus::Initialised);
    assert_eq!(stored.tallies.line_count(), 0);
    assert!(stored.summary.is_zero());
    assert!(f.invoice(transaction.invoice_id).await.is_none());
    assert_eq!(f.store.transaction_count(bill_run.id).await, 0);
    assert!(f.notifier.errors().is_empty());
}

#[tokio::test]
async fn test_deleting_invoice_from_generated_bill_run_updates_summary() {
    let f = fixture().await;
    let bill_run = f.new_bill_run().await;
    let big = f.add(bill_run.id, charge("CUST1", "LIC/1", 1000, false)).await;
    f.add(bill_run.id, charge("CUST2", "LIC/2", 300, false)).await;
    let generated = f.services.bill_runs.generate(&f.regime, bill_run.id).await.unwrap();
    assert_eq!(generated.summary.invoice_count, 1);

    let handle = f
        .services
        .deletion
        .delete_invoice(&f.regime, bill_run.id, big.invoice_id)
        .await
        .unwrap();
    handle.await.unwrap();

    let stored = f.bill_run(bill_run.id).await;
    assert_eq!(stored.status, BillRunStatus::Generated);
    assert_eq!(stored.summary.invoice_count, 0);
    assert_eq!(stored.summary.invoice_value, 0);
    assert_eq!(stored.tallies.debit_line_count, 1);
    assert_eq!(stored.tallies.debit_line_value, 300);
}

#[tokio::test]
async fn test_delete_invoice_from_other_bill_run_is_rejected() {
    let f = fixture().await;
    let first = f.new_bill_run().await;
    let second = f.new_bill_run().await;
    let transaction = f.add(first.id, charge("CUST1", "LIC/1", 1000, false)).await;

    let result = f
        .services
        .deletion
        .delete_invoice(&f.regime, second.id, transaction.invoice_id)
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let missing = f
        .services
        .deletion
        .delete_invoice(&f.regime, first.id, Uuid::now_v7())
        .await;
    assert!(matches!(missing, Err(AppError::InvoiceNotFound(_))));
}

#[tokio::test]
async fn test_deleting_licence_restores_status_and_reflags_invoice() {
    let f = fixture().await;
    let bill_run = f.new_bill_run().await;
    let lic1 = f.add(bill_run.id, charge("CUST1", "LIC/1", 1000, false)).await;
    let lic2 = f.add(bill_run.id, charge("CUST1", "LIC/2", 300, false)).await;
    let generated = f.services.bill_runs.generate(&f.regime, bill_run.id).await.unwrap();
    assert_eq!(generated.summary.invoice_value, 1300);

    let handle = f
        .services
        .deletion
        .delete_licence(&f.regime, bill_run.id, lic1.licence_id)
        .await
        .unwrap();
    handle.await.unwrap();

    let stored = f.bill_run(bill_run.id).await;
    assert_eq!(stored.status, BillRunStatus::Generated);
    assert_eq!(stored.tallies.debit_line_value, 300);
    assert!(stored.summary.is_zero());

    let invoice = f.invoice(lic2.invoice_id).await.unwrap();
    assert_eq!(invoice.tallies.debit_line_value, 300);
    assert!(invoice.flags.deminimis_invoice);
    assert_eq!(f.licences(invoice.id).await.len(), 1);
    assert_eq!(f.store.transaction_count(bill_run.id).await, 1);

    let handle = f
        .services
        .deletion
        .delete_licence(&f.regime, bill_run.id, lic2.licence_id)
        .await
        .unwrap();
    handle.await.unwrap();

    let stored = f.bill_run(bill_run.id).await;
    assert_eq!(stored.status, BillRunStatus::Initialised);
    assert_eq!(stored.tallies.line_count(), 0);
    assert!(f.invoice(lic2.invoice_id).await.is_none());
    assert!(f.notifier.errors().is_empty());
}

#[tokio::test]
async fn test_missing_licence_is_not_found() {
    let f = fixture().await;
    let bill_run = f.new_bill_run().await;

    let result = f
        .services
        .deletion
        .delete_licence(&f.regime, bill_run.id, Uuid::now_v7())
        .await;

    assert!(matches!(result, Err(AppError::LicenceNotFound(_))));
    assert_eq!(f.bill_run(bill_run.id).await.status, BillRunStatus::Initialised);
}

#[tokio::test]
async fn test_delete_invoice_is_rejected_while_pending() {
    let f = fixture().await;
    let bill_run = f.new_bill_run().await;
    let small = f.add(bill_run.id, charge("CUST1", "LIC/1", 1000, false)).await;
    f.add(bill_run.id, charge("CUST2", "LIC/2", 3000, false)).await;
    f.services.bill_runs.generate(&f.regime, bill_run.id).await.unwrap();

    f.set_status(bill_run.id, BillRunStatus::Pending).await;
    let result = f
        .services
        .deletion
        .delete_invoice(&f.regime, bill_run.id, small.invoice_id)
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    f.set_status(bill_run.id, BillRunStatus::Generated).await;
    let stored = f.bill_run(bill_run.id).await;
    assert_eq!(stored.tallies.debit_line_value, 4000);
    assert_eq!(stored.summary.invoice_count, 2);
    assert_eq!(stored.summary.invoice_value, 4000);
    assert!(f.invoice(small.invoice_id).await.is_some());
}

#[tokio::test]
async fn test_invoice_deletion_task_fails_if_bill_run_became_pending() {
    let f = fixture().await;
    let bill_run = f.new_bill_run().await;
    let small = f.add(bill_run.id, charge("CUST1", "LIC/1", 1000, false)).await;
    f.add(bill_run.id, charge("CUST2", "LIC/2", 3000, false)).await;
    f.services.bill_runs.generate(&f.regime, bill_run.id).await.unwrap();

    let handle = f
        .services
        .deletion
        .delete_invoice(&f.regime, bill_run.id, small.invoice_id)
        .await
        .unwrap();
    f.set_status(bill_run.id, BillRunStatus::Pending).await;
    handle.await.unwrap();

    let errors = f.notifier.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "Error in delete_invoice");
    assert!(f.invoice(small.invoice_id).await.is_some());

    f.set_status(bill_run.id, BillRunStatus::Generated).await;
    let handle = f
        .services
        .deletion
        .delete_invoice(&f.regime, bill_run.id, small.invoice_id)
        .await
        .unwrap();
    handle.await.unwrap();

    let stored = f.bill_run(bill_run.id).await;
    assert_eq!(stored.status, BillRunStatus::Generated);
    assert_eq!(stored.tallies.debit_line_value, 3000);
    assert_eq!(stored.summary.invoice_count, 1);
    assert_eq!(stored.summary.invoice_value, 3000);
}

fn adjustment(customer: &str, licence: &str, value: i64) -> NewTransaction {
    NewTransaction {
        subject_to_minimum_charge: true,
        minimum_charge_adjustment: true,
        ..charge(customer, licence, value, false)
    }
}

#[tokio::test]
async fn test_minimum_charge_adjustment_drives_flags_after_licence_deletion() {
    let f = fixture().await;
    let bill_run = f.new_bill_run().await;

    // CUST1 keeps its adjustment when the other licence goes
    let full = f.add(bill_run.id, charge("CUST1", "LIC/1", 1000, false)).await;
    let kept = f.add(bill_run.id, adjustment("CUST1", "LIC/2", 200)).await;
    // CUST2 loses its adjustment with its licence
    let plain = f.add(bill_run.id, charge("CUST2", "LIC/3", 300, false)).await;
    let dropped = f.add(bill_run.id, adjustment("CUST2", "LIC/4", 100)).await;

    let generated = f.services.bill_runs.generate(&f.regime, bill_run.id).await.unwrap();
    assert_eq!(generated.summary.invoice_count, 2);
    assert_eq!(generated.summary.invoice_value, 1600);
    for invoice_id in [full.invoice_id, plain.invoice_id] {
        let invoice = f.invoice(invoice_id).await.unwrap();
        assert!(invoice.flags.minimum_charge_invoice);
        assert!(!invoice.flags.deminimis_invoice);
    }

    let handle = f
        .services
        .deletion
        .delete_licence(&f.regime, bill_run.id, full.licence_id)
        .await
        .unwrap();
    handle.await.unwrap();

    let invoice = f.invoice(kept.invoice_id).await.unwrap();
    assert_eq!(invoice.net_total(), 200);
    assert!(invoice.flags.minimum_charge_invoice);
    assert!(!invoice.flags.deminimis_invoice);

    let handle = f
        .services
        .deletion
        .delete_licence(&f.regime, bill_run.id, dropped.licence_id)
        .await
        .unwrap();
    handle.await.unwrap();

    let invoice = f.invoice(plain.invoice_id).await.unwrap();
    assert_eq!(invoice.net_total(), 300);
    assert!(!invoice.flags.minimum_charge_invoice);
    assert!(invoice.flags.deminimis_invoice);

    let stored = f.bill_run(bill_run.id).await;
    assert_eq!(stored.status, BillRunStatus::Generated);
    assert_eq!(stored.summary.invoice_count, 1);
    assert_eq!(stored.summary.invoice_value, 200);
    assert!(f.notifier.errors().is_empty());
}

#[tokio::test]
async fn test_delete_licence_is_rejected_while_pending() {
    let f = fixture().await;
    let bill_run = f.new_bill_run().await;
    let transaction = f.add(bill_run.id, charge("CUST1", "LIC/1", 1000, false)).await;
    f.services.bill_runs.generate(&f.regime, bill_run.id).await.unwrap();
    f.services.bill_runs.approve(&f.regime, bill_run.id).await.unwrap();

    // As a send in flight leaves it
    f.set_status(bill_run.id, BillRunStatus::Pending).await;
    let result = f
        .services
        .deletion
        .delete_licence(&f.regime, bill_run.id, transaction.licence_id)
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(f.bill_run(bill_run.id).await.status, BillRunStatus::Pending);
    assert_eq!(f.licences(transaction.invoice_id).await.len(), 1);
}
