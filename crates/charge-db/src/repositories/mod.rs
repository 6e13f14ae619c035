//! Repository implementations for `PgLedgerTx`
//!
//! Each module implements one repository trait from `charge-core` on the
//! transaction-scoped unit of work. Tallies are stored as one BIGINT column per
//! field and patched in place with `col = col + $n`.

pub mod bill_run_repo;
pub mod invoice_repo;
pub mod licence_repo;
pub mod regime_repo;
pub mod sequence_counter_repo;
pub mod transaction_repo;

use charge_core::models::LineTallies;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

/// Line tally columns shared by bill_runs, invoices and licences
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct LineTallyColumns {
    credit_line_count: i64,
    credit_line_value: i64,
    debit_line_count: i64,
    debit_line_value: i64,
    zero_line_count: i64,
    subject_to_minimum_charge_count: i64,
    subject_to_minimum_charge_credit_value: i64,
    subject_to_minimum_charge_debit_value: i64,
}

impl From<LineTallyColumns> for LineTallies {
    fn from(row: LineTallyColumns) -> Self {
        Self {
            credit_line_count: row.credit_line_count,
            credit_line_value: row.credit_line_value,
            debit_line_count: row.debit_line_count,
            debit_line_value: row.debit_line_value,
            zero_line_count: row.zero_line_count,
            subject_to_minimum_charge_count: row.subject_to_minimum_charge_count,
            subject_to_minimum_charge_credit_value: row.subject_to_minimum_charge_credit_value,
            subject_to_minimum_charge_debit_value: row.subject_to_minimum_charge_debit_value,
        }
    }
}

/// Bind the eight line tally fields in column order
pub(crate) fn bind_line_tallies<'q>(
    query: Query<'q, Postgres, PgArguments>,
    tallies: &LineTallies,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(tallies.credit_line_count)
        .bind(tallies.credit_line_value)
        .bind(tallies.debit_line_count)
        .bind(tallies.debit_line_value)
        .bind(tallies.zero_line_count)
        .bind(tallies.subject_to_minimum_charge_count)
        .bind(tallies.subject_to_minimum_charge_credit_value)
        .bind(tallies.subject_to_minimum_charge_debit_value)
}
