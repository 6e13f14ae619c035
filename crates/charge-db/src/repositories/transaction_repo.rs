//! Transaction repository implementation
//!
//! Transactions are append-only; removal happens through licence and
//! invoice deletion.

use crate::store::PgLedgerTx;
use async_trait::async_trait;
use charge_core::{
    models::Transaction, traits::TransactionRepository, AppError, AppResult,
};
use chrono::{DateTime, Utc};
use tracing::{debug, error, instrument};
use uuid::Uuid;

#[async_trait]
impl TransactionRepository for PgLedgerTx {
    #[instrument(skip(self, transaction), fields(transaction_id = %transaction.id))]
    async fn insert_transaction(&mut self, transaction: &Transaction) -> AppResult<()> {
        debug!(
            "Inserting transaction for licence {} ({} {})",
            transaction.licence_number,
            transaction.charge_value,
            if transaction.charge_credit { "credit" } else { "debit" }
        );

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, bill_run_id, invoice_id, licence_id, regime_id,
                ruleset, region, customer_reference, licence_number, financial_year,
                charge_value, charge_credit, client_id,
                subject_to_minimum_charge, minimum_charge_adjustment,
                rebilled_transaction_id, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.bill_run_id)
        .bind(transaction.invoice_id)
        .bind(transaction.licence_id)
        .bind(transaction.regime_id)
        .bind(transaction.ruleset.to_string())
        .bind(&transaction.region)
        .bind(&transaction.customer_reference)
        .bind(&transaction.licence_number)
        .bind(transaction.financial_year)
        .bind(transaction.charge_value)
        .bind(transaction.charge_credit)
        .bind(&transaction.client_id)
        .bind(transaction.subject_to_minimum_charge)
        .bind(transaction.minimum_charge_adjustment)
        .bind(transaction.rebilled_transaction_id)
        .bind(&transaction.created_by)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Database error inserting transaction {}: {}", transaction.id, e);
            if e.to_string().contains("unique constraint") {
                AppError::Conflict(format!(
                    "A transaction with client ID '{}' for this regime already exists",
                    transaction.client_id.as_deref().unwrap_or_default()
                ))
            } else {
                AppError::Database(format!("Failed to create transaction: {}", e))
            }
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_transactions_for_licence(&mut self, licence_id: Uuid) -> AppResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<sqlx::Postgres, TransactionRow>(
            r#"
            SELECT
                id, bill_run_id, invoice_id, licence_id, regime_id,
                ruleset, region, customer_reference, licence_number, financial_year,
                charge_value, charge_credit, client_id,
                subject_to_minimum_charge, minimum_charge_adjustment,
                rebilled_transaction_id, created_by, created_at, updated_at
            FROM transactions
            WHERE licence_id = $1
            ORDER BY id
            "#,
        )
        .bind(licence_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Database error listing transactions for licence {}: {}", licence_id, e);
            AppError::Database(format!("Failed to fetch transactions: {}", e))
        })?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self))]
    async fn client_id_exists(&mut self, regime_id: Uuid, client_id: &str) -> AppResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM transactions WHERE regime_id = $1 AND client_id = $2)",
        )
        .bind(regime_id)
        .bind(client_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Database error checking client id {}: {}", client_id, e);
            AppError::Database(format!("Failed to check client id: {}", e))
        })?;

        Ok(exists)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    bill_run_id: Uuid,
    invoice_id: Uuid,
    licence_id: Uuid,
    regime_id: Uuid,
    ruleset: String,
    region: String,
    customer_reference: String,
    licence_number: String,
    financial_year: i32,
    charge_value: i64,
    charge_credit: bool,
    client_id: Option<String>,
    subject_to_minimum_charge: bool,
    minimum_charge_adjustment: bool,
    rebilled_transaction_id: Option<Uuid>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            bill_run_id: row.bill_run_id,
            invoice_id: row.invoice_id,
            licence_id: row.licence_id,
            regime_id: row.regime_id,
            ruleset: row.ruleset.parse()?,
            region: row.region,
            customer_reference: row.customer_reference,
            licence_number: row.licence_number,
            financial_year: row.financial_year,
            charge_value: row.charge_value,
            charge_credit: row.charge_credit,
            client_id: row.client_id,
            subject_to_minimum_charge: row.subject_to_minimum_charge,
            minimum_charge_adjustment: row.minimum_charge_adjustment,
            rebilled_transaction_id: row.rebilled_transaction_id,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
