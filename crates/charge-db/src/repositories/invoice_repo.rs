//! Invoice repository implementation

use super::{bind_line_tallies, LineTallyColumns};
use crate::store::PgLedgerTx;
use async_trait::async_trait;
use charge_core::{
    models::{Invoice, InvoiceFlags, LineTallies, RebilledType},
    traits::InvoiceRepository,
    AppError, AppResult,
};
use chrono::{DateTime, Utc};
use tracing::{debug, error, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = r#"
    id, bill_run_id, customer_reference, financial_year,
    credit_line_count, credit_line_value, debit_line_count, debit_line_value,
    zero_line_count, subject_to_minimum_charge_count,
    subject_to_minimum_charge_credit_value, subject_to_minimum_charge_debit_value,
    zero_value_invoice, deminimis_invoice, minimum_charge_invoice,
    transaction_reference, rebilled_type, rebilled_invoice_id,
    created_at, updated_at
"#;

#[async_trait]
impl InvoiceRepository for PgLedgerTx {
    #[instrument(skip(self))]
    async fn find_invoice(&mut self, id: Uuid) -> AppResult<Option<Invoice>> {
        debug!("Finding invoice by id: {}", id);

        let sql = format!("SELECT {} FROM invoices WHERE id = $1", INVOICE_COLUMNS);
        let row = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error finding invoice {}: {}", id, e);
                AppError::Database(format!("Failed to find invoice: {}", e))
            })?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self))]
    async fn find_original_invoice(
        &mut self,
        bill_run_id: Uuid,
        customer_reference: &str,
        financial_year: i32,
    ) -> AppResult<Option<Invoice>> {
        debug!(
            "Finding invoice for {} / {} on bill run {}",
            customer_reference, financial_year, bill_run_id
        );

        let sql = format!(
            "SELECT {} FROM invoices \
             WHERE bill_run_id = $1 AND customer_reference = $2 AND financial_year = $3 \
               AND rebilled_type = $4 AND rebilled_invoice_id IS NULL",
            INVOICE_COLUMNS
        );
        let row = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(&sql)
            .bind(bill_run_id)
            .bind(customer_reference.to_uppercase())
            .bind(financial_year)
            .bind(RebilledType::Original.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error finding invoice for {}: {}", customer_reference, e);
                AppError::Database(format!("Failed to find invoice: {}", e))
            })?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id))]
    async fn insert_invoice(&mut self, invoice: &Invoice) -> AppResult<()> {
        debug!("Inserting {} invoice for {}", invoice.rebilled_type, invoice.customer_reference);

        let query = sqlx::query(
            r#"
            INSERT INTO invoices (
                id, bill_run_id, customer_reference, financial_year,
                zero_value_invoice, deminimis_invoice, minimum_charge_invoice,
                transaction_reference, rebilled_type, rebilled_invoice_id,
                created_at, updated_at,
                credit_line_count, credit_line_value, debit_line_count, debit_line_value,
                zero_line_count, subject_to_minimum_charge_count,
                subject_to_minimum_charge_credit_value, subject_to_minimum_charge_debit_value
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.bill_run_id)
        .bind(&invoice.customer_reference)
        .bind(invoice.financial_year)
        .bind(invoice.flags.zero_value_invoice)
        .bind(invoice.flags.deminimis_invoice)
        .bind(invoice.flags.minimum_charge_invoice)
        .bind(&invoice.transaction_reference)
        .bind(invoice.rebilled_type.as_str())
        .bind(invoice.rebilled_invoice_id)
        .bind(invoice.created_at)
        .bind(invoice.updated_at);

        bind_line_tallies(query, &invoice.tallies)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error inserting invoice {}: {}", invoice.id, e);
                if e.to_string().contains("unique constraint") {
                    AppError::Conflict(format!(
                        "Invoice for {} in financial year {} already exists",
                        invoice.customer_reference, invoice.financial_year
                    ))
                } else {
                    AppError::Database(format!("Failed to create invoice: {}", e))
                }
            })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_invoices(&mut self, bill_run_id: Uuid) -> AppResult<Vec<Invoice>> {
        debug!("Listing invoices for bill run {}", bill_run_id);

        let sql = format!(
            "SELECT {} FROM invoices WHERE bill_run_id = $1 ORDER BY id",
            INVOICE_COLUMNS
        );
        let rows = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(&sql)
            .bind(bill_run_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error listing invoices for {}: {}", bill_run_id, e);
                AppError::Database(format!("Failed to fetch invoices: {}", e))
            })?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self, lines))]
    async fn apply_invoice_patch(&mut self, id: Uuid, lines: &LineTallies) -> AppResult<()> {
        debug!("Patching invoice {} tallies", id);

        let query = sqlx::query(
            r#"
            UPDATE invoices
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
                error!("Database error patching invoice {}: {}", id, e);
                AppError::Database(format!("Failed to update invoice tallies: {}", e))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvoiceNotFound(id.to_string()));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_invoice_flags(&mut self, id: Uuid, flags: &InvoiceFlags) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE invoices
            SET zero_value_invoice = $2,
                deminimis_invoice = $3,
                minimum_charge_invoice = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(flags.zero_value_invoice)
        .bind(flags.deminimis_invoice)
        .bind(flags.minimum_charge_invoice)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Database error updating invoice {} flags: {}", id, e);
            AppError::Database(format!("Failed to update invoice flags: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_invoice_transaction_reference(
        &mut self,
        id: Uuid,
        transaction_reference: &str,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE invoices SET transaction_reference = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(transaction_reference)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Database error setting invoice {} reference: {}", id, e);
            AppError::Database(format!("Failed to update invoice reference: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_invoice(&mut self, id: Uuid) -> AppResult<bool> {
        debug!("Deleting invoice {} with its licences and transactions", id);

        for sql in [
            "DELETE FROM transactions WHERE invoice_id = $1",
            "DELETE FROM licences WHERE invoice_id = $1",
        ] {
            sqlx::query(sql)
                .bind(id)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| {
                    error!("Database error deleting children of invoice {}: {}", id, e);
                    AppError::Database(format!("Failed to delete invoice: {}", e))
                })?;
        }

        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error deleting invoice {}: {}", id, e);
                AppError::Database(format!("Failed to delete invoice: {}", e))
            })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn find_rebilling_invoice(&mut self, original_id: Uuid) -> AppResult<Option<Invoice>> {
        let sql = format!(
            "SELECT {} FROM invoices WHERE rebilled_invoice_id = $1 AND rebilled_type = $2 LIMIT 1",
            INVOICE_COLUMNS
        );
        let row = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(&sql)
            .bind(original_id)
            .bind(RebilledType::Cancel.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error finding rebill of invoice {}: {}", original_id, e);
                AppError::Database(format!("Failed to find invoice: {}", e))
            })?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self))]
    async fn has_minimum_charge_adjustment(&mut self, invoice_id: Uuid) -> AppResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM transactions
                WHERE invoice_id = $1 AND minimum_charge_adjustment = TRUE
            )
            "#,
        )
        .bind(invoice_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Database error checking adjustments on invoice {}: {}", invoice_id, e);
            AppError::Database(format!("Failed to check minimum charge: {}", e))
        })?;

        Ok(exists)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    bill_run_id: Uuid,
    customer_reference: String,
    financial_year: i32,
    #[sqlx(flatten)]
    tallies: LineTallyColumns,
    zero_value_invoice: bool,
    deminimis_invoice: bool,
    minimum_charge_invoice: bool,
    transaction_reference: Option<String>,
    rebilled_type: String,
    rebilled_invoice_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = AppError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            bill_run_id: row.bill_run_id,
            customer_reference: row.customer_reference,
            financial_year: row.financial_year,
            tallies: row.tallies.into(),
            flags: InvoiceFlags {
                zero_value_invoice: row.zero_value_invoice,
                deminimis_invoice: row.deminimis_invoice,
                minimum_charge_invoice: row.minimum_charge_invoice,
            },
            transaction_reference: row.transaction_reference,
            rebilled_type: row.rebilled_type.parse()?,
            rebilled_invoice_id: row.rebilled_invoice_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
