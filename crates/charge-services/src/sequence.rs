//! Sequence issuers
//!
//! Every issuer runs inside the caller's unit of work, so a number is only
//! consumed if the work that uses it commits. Two concurrent callers for the
//! same (regime, region) are serialised by the counter row lock and always
//! receive distinct values.

use charge_core::{
    models::{CounterField, Ruleset, TransactionType},
    reference,
    traits::SequenceCounterRepository,
    AppError, AppResult,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Increment `field` for (regime, region) and return the new value
#[instrument(skip(tx))]
pub async fn next_value<T: SequenceCounterRepository>(
    tx: &mut T,
    regime_id: Uuid,
    region: &str,
    field: CounterField,
) -> AppResult<i64> {
    match tx.increment_counter(regime_id, region, field).await? {
        Some(value) => {
            debug!("Issued {} {} for {}/{}", field, value, regime_id, region);
            Ok(value)
        }
        None => {
            warn!("No sequence counter for regime {} region {}", regime_id, region);
            Err(AppError::SequenceCounterNotFound {
                regime: regime_id.to_string(),
                region: region.to_string(),
            })
        }
    }
}

pub async fn next_bill_run_number<T: SequenceCounterRepository>(
    tx: &mut T,
    regime_id: Uuid,
    region: &str,
) -> AppResult<i64> {
    next_value(tx, regime_id, region, CounterField::BillRunNumber).await
}

/// Issue the next transaction reference for an invoice
pub async fn next_transaction_reference<T: SequenceCounterRepository>(
    tx: &mut T,
    regime_id: Uuid,
    region: &str,
    ruleset: Ruleset,
    transaction_type: TransactionType,
) -> AppResult<String> {
    let number = next_value(tx, regime_id, region, CounterField::transaction_number(ruleset)).await?;
    reference::transaction_reference(region, ruleset, transaction_type, number)
}

/// Issue the next transaction file reference for a bill run
pub async fn next_transaction_file_reference<T: SequenceCounterRepository>(
    tx: &mut T,
    regime_id: Uuid,
    prefix: &str,
    region: &str,
    ruleset: Ruleset,
) -> AppResult<String> {
    let number = next_value(tx, regime_id, region, CounterField::TransactionFileNumber).await?;
    reference::transaction_file_reference(prefix, region, ruleset, number)
}

/// Issue the next customer file reference
pub async fn next_customer_file_reference<T: SequenceCounterRepository>(
    tx: &mut T,
    regime_id: Uuid,
    prefix: &str,
    region: &str,
) -> AppResult<String> {
    let number = next_value(tx, regime_id, region, CounterField::CustomerFileNumber).await?;
    reference::customer_file_reference(prefix, region, number)
}
