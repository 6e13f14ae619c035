//! Bill run repository implementation
//!
//! Status transitions that race with other writers go through conditional
//! updates (`WHERE status = $expected`, `WHERE NOT EXISTS (...)`) and report
//! whether a row changed.

use super::{bind_line_tallies, LineTallyColumns};
use crate::store::PgLedgerTx;
use async_trait::async_trait;
use charge_core::{
    ledger::TallyPatch,
    models::{BillRun, BillRunStatus, SummaryTallies},
    traits::BillRunRepository,
    AppError, AppResult,
};
use chrono::{DateTime, Utc};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

const SELECT_BILL_RUN: &str = r#"
    SELECT
        id, regime_id, region, ruleset, status,
        bill_run_number, file_reference,
        credit_line_count, credit_line_value, debit_line_count, debit_line_value,
        zero_line_count, subject_to_minimum_charge_count,
        subject_to_minimum_charge_credit_value, subject_to_minimum_charge_debit_value,
        credit_note_count, credit_note_value, invoice_count, invoice_value,
        created_by, created_at, updated_at
    FROM bill_runs
    WHERE id = $1
"#;

impl PgLedgerTx {
    async fn fetch_bill_run(&mut self, id: Uuid, for_update: bool) -> AppResult<Option<BillRun>> {
        let sql = if for_update {
            format!("{} FOR UPDATE", SELECT_BILL_RUN)
        } else {
            SELECT_BILL_RUN.to_string()
        };

        let row = sqlx::query_as::<sqlx::Postgres, BillRunRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error finding bill run {}: {}", id, e);
                AppError::Database(format!("Failed to find bill run: {}", e))
            })?;

        row.map(TryInto::try_into).transpose()
    }
}

#[async_trait]
impl BillRunRepository for PgLedgerTx {
    #[instrument(skip(self))]
    async fn find_bill_run(&mut self, id: Uuid) -> AppResult<Option<BillRun>> {
        debug!("Finding bill run by id: {}", id);
        self.fetch_bill_run(id, false).await
    }

    #[instrument(skip(self))]
    async fn lock_bill_run(&mut self, id: Uuid) -> AppResult<Option<BillRun>> {
        debug!("Locking bill run: {}", id);
        self.fetch_bill_run(id, true).await
    }

    #[instrument(skip(self, bill_run), fields(bill_run_id = %bill_run.id))]
    async fn insert_bill_run(&mut self, bill_run: &BillRun) -> AppResult<()> {
        debug!("Inserting bill run {:?} for region {}", bill_run.bill_run_number, bill_run.region);

        let query = sqlx::query(
            r#"
            INSERT INTO bill_runs (
                id, regime_id, region, ruleset, status,
                bill_run_number, file_reference, created_by,
                created_at, updated_at,
                credit_line_count, credit_line_value, debit_line_count, debit_line_value,
                zero_line_count, subject_to_minimum_charge_count,
                subject_to_minimum_charge_credit_value, subject_to_minimum_charge_debit_value,
                credit_note_count, credit_note_value, invoice_count, invoice_value
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            "#,
        )
        .bind(bill_run.id)
        .bind(bill_run.regime_id)
        .bind(&bill_run.region)
        .bind(bill_run.ruleset.to_string())
        .bind(bill_run.status.to_string())
        .bind(bill_run.bill_run_number)
        .bind(&bill_run.file_reference)
        .bind(&bill_run.created_by)
        .bind(bill_run.created_at)
        .bind(bill_run.updated_at);

        bind_line_tallies(query, &bill_run.tallies)
            .bind(bill_run.summary.credit_note_count)
            .bind(bill_run.summary.credit_note_value)
            .bind(bill_run.summary.invoice_count)
            .bind(bill_run.summary.invoice_value)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error inserting bill run {}: {}", bill_run.id, e);
                AppError::Database(format!("Failed to create bill run: {}", e))
            })?;

        Ok(())
    }

    #[instrument(skip(self, patch))]
    async fn apply_bill_run_patch(&mut self, id: Uuid, patch: &TallyPatch) -> AppResult<()> {
        debug!("Patching bill run {} tallies", id);

        let summary = patch.summary.unwrap_or_default();

        let query = sqlx::query(
            r#"
            UPDATE bill_runs
            SET credit_line_count = credit_line_count + $2,
                credit_line_value = credit_line_value + $3,
                debit_line_count = debit_line_count + $4,
                debit_line_value = debit_line_value + $5,
                zero_line_count = zero_line_count + $6,
                subject_to_minimum_charge_count = subject_to_minimum_charge_count + $7,
                subject_to_minimum_charge_credit_value = subject_to_minimum_charge_credit_value + $8,
                subject_to_minimum_charge_debit_value = subject_to_minimum_charge_debit_value + $9,
                credit_note_count = credit_note_count + $10,
                credit_note_value = credit_note_value + $11,
                invoice_count = invoice_count + $12,
                invoice_value = invoice_value + $13,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id);

        let result = bind_line_tallies(query, &patch.lines)
            .bind(summary.credit_note_count)
            .bind(summary.credit_note_value)
            .bind(summary.invoice_count)
            .bind(summary.invoice_value)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error patching bill run {}: {}", id, e);
                AppError::Database(format!("Failed to update bill run tallies: {}", e))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::BillRunNotFound(id.to_string()));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_bill_run_status(&mut self, id: Uuid, status: BillRunStatus) -> AppResult<()> {
        debug!("Setting bill run {} status to {}", id, status);

        let result = sqlx::query("UPDATE bill_runs SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error updating bill run {} status: {}", id, e);
                AppError::Database(format!("Failed to update bill run status: {}", e))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::BillRunNotFound(id.to_string()));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_bill_run_status_if(
        &mut self,
        id: Uuid,
        expected: BillRunStatus,
        status: BillRunStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bill_runs
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(expected.to_string())
        .bind(status.to_string())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Database error updating bill run {} status: {}", id, e);
            AppError::Database(format!("Failed to update bill run status: {}", e))
        })?;

        let updated = result.rows_affected() > 0;
        if !updated {
            warn!("Bill run {} was not {}; status left unchanged", id, expected);
        }

        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn mark_bill_run_initialised_if_empty(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bill_runs
            SET status = $2, updated_at = NOW()
            WHERE id = $1
              AND NOT EXISTS (SELECT 1 FROM invoices WHERE bill_run_id = $1)
            "#,
        )
        .bind(id)
        .bind(BillRunStatus::Initialised.to_string())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Database error resetting bill run {}: {}", id, e);
            AppError::Database(format!("Failed to reset bill run status: {}", e))
        })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, summary))]
    async fn set_bill_run_summary(&mut self, id: Uuid, summary: &SummaryTallies) -> AppResult<()> {
        debug!("Setting bill run {} summary", id);

        sqlx::query(
            r#"
            UPDATE bill_runs
            SET credit_note_count = $2,
                credit_note_value = $3,
                invoice_count = $4,
                invoice_value = $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(summary.credit_note_count)
        .bind(summary.credit_note_value)
        .bind(summary.invoice_count)
        .bind(summary.invoice_value)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Database error setting bill run {} summary: {}", id, e);
            AppError::Database(format!("Failed to update bill run summary: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_bill_run_status_with_file(
        &mut self,
        id: Uuid,
        status: BillRunStatus,
        file_reference: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE bill_runs
            SET status = $2, file_reference = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(file_reference)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Database error updating bill run {} file reference: {}", id, e);
            AppError::Database(format!("Failed to update bill run: {}", e))
        })?;

        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BillRunRow {
    id: Uuid,
    regime_id: Uuid,
    region: String,
    ruleset: String,
    status: String,
    bill_run_number: Option<i64>,
    file_reference: Option<String>,
    #[sqlx(flatten)]
    tallies: LineTallyColumns,
    credit_note_count: i64,
    credit_note_value: i64,
    invoice_count: i64,
    invoice_value: i64,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BillRunRow> for BillRun {
    type Error = AppError;

    fn try_from(row: BillRunRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            regime_id: row.regime_id,
            region: row.region,
            ruleset: row.ruleset.parse()?,
            status: row.status.parse()?,
            bill_run_number: row.bill_run_number,
            file_reference: row.file_reference,
            tallies: row.tallies.into(),
            summary: SummaryTallies {
                credit_note_count: row.credit_note_count,
                credit_note_value: row.credit_note_value,
                invoice_count: row.invoice_count,
                invoice_value: row.invoice_value,
            },
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
