//! Licence repository implementation

use super::{bind_line_tallies, LineTallyColumns};
use crate::store::PgLedgerTx;
use async_trait::async_trait;
use charge_core::{
    models::{Licence, LineTallies},
    traits::LicenceRepository,
    AppError, AppResult,
};
use chrono::{DateTime, Utc};
use tracing::{debug, error, instrument};
use uuid::Uuid;

const LICENCE_COLUMNS: &str = r#"
    id, invoice_id, bill_run_id, licence_number,
    credit_line_count, credit_line_value, debit_line_count, debit_line_value,
    zero_line_count, subject_to_minimum_charge_count,
    subject_to_minimum_charge_credit_value, subject_to_minimum_charge_debit_value,
    created_at, updated_at
"#;

#[async_trait]
impl LicenceRepository for PgLedgerTx {
    #[instrument(skip(self))]
    async fn find_licence(&mut self, id: Uuid) -> AppResult<Option<Licence>> {
        debug!("Finding licence by id: {}", id);

        let sql = format!("SELECT {} FROM licences WHERE id = $1", LICENCE_COLUMNS);
        let row = sqlx::query_as::<sqlx::Postgres, LicenceRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error finding licence {}: {}", id, e);
                AppError::Database(format!("Failed to find licence: {}", e))
            })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_licence_by_number(
        &mut self,
        invoice_id: Uuid,
        licence_number: &str,
    ) -> AppResult<Option<Licence>> {
        let sql = format!(
            "SELECT {} FROM licences WHERE invoice_id = $1 AND licence_number = $2",
            LICENCE_COLUMNS
        );
        let row = sqlx::query_as::<sqlx::Postgres, LicenceRow>(&sql)
            .bind(invoice_id)
            .bind(licence_number)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error finding licence {}: {}", licence_number, e);
                AppError::Database(format!("Failed to find licence: {}", e))
            })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, licence), fields(licence_id = %licence.id))]
    async fn insert_licence(&mut self, licence: &Licence) -> AppResult<()> {
        debug!("Inserting licence {} on invoice {}", licence.licence_number, licence.invoice_id);

        let query = sqlx::query(
            r#"
            INSERT INTO licences (
                id, invoice_id, bill_run_id, licence_number, created_at, updated_at,
                credit_line_count, credit_line_value, debit_line_count, debit_line_value,
                zero_line_count, subject_to_minimum_charge_count,
                subject_to_minimum_charge_credit_value, subject_to_minimum_charge_debit_value
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(licence.id)
        .bind(licence.invoice_id)
        .bind(licence.bill_run_id)
        .bind(&licence.licence_number)
        .bind(licence.created_at)
        .bind(licence.updated_at);

        bind_line_tallies(query, &licence.tallies)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error inserting licence {}: {}", licence.id, e);
                AppError::Database(format!("Failed to create licence: {}", e))
            })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_licences(&mut self, invoice_id: Uuid) -> AppResult<Vec<Licence>> {
        let sql = format!(
            "SELECT {} FROM licences WHERE invoice_id = $1 ORDER BY id",
            LICENCE_COLUMNS
        );
        let rows = sqlx::query_as::<sqlx::Postgres, LicenceRow>(&sql)
            .bind(invoice_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error listing licences for invoice {}: {}", invoice_id, e);
                AppError::Database(format!("Failed to fetch licences: {}", e))
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, lines))]
    async fn apply_licence_patch(&mut self, id: Uuid, lines: &LineTallies) -> AppResult<()> {
        let query = sqlx::query(
            r#"
            UPDATE licences
            SET credit_line_count = credit_line_count + $2,
                credit_line_value = credit_line_value + $3,
                debit_line_count = debit_line_count + $4,
                debit_line_value = debit_line_value + $5,
                zero_line_count = zero_line_count + $6,
                subject_to_minimum_charge_count = subject_to_minimum_charge_count + $7,
                subject_to_minimum_charge_credit_value = subject_to_minimum_charge_credit_value + $8,
                subject_to_minimum_charge_debit_value = subject_to_minimum_charge_debit_value + $9,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id);

        let result = bind_line_tallies(query, lines)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error patching licence {}: {}", id, e);
                AppError::Database(format!("Failed to update licence tallies: {}", e))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::LicenceNotFound(id.to_string()));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_licence(&mut self, id: Uuid) -> AppResult<bool> {
        debug!("Deleting licence {} with its transactions", id);

        sqlx::query("DELETE FROM transactions WHERE licence_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error deleting transactions of licence {}: {}", id, e);
                AppError::Database(format!("Failed to delete licence: {}", e))
            })?;

        let result = sqlx::query("DELETE FROM licences WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error deleting licence {}: {}", id, e);
                AppError::Database(format!("Failed to delete licence: {}", e))
            })?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LicenceRow {
    id: Uuid,
    invoice_id: Uuid,
    bill_run_id: Uuid,
    licence_number: String,
    #[sqlx(flatten)]
    tallies: LineTallyColumns,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LicenceRow> for Licence {
    fn from(row: LicenceRow) -> Self {
        Self {
            id: row.id,
            invoice_id: row.invoice_id,
            bill_run_id: row.bill_run_id,
            licence_number: row.licence_number,
            tallies: row.tallies.into(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
