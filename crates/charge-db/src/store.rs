//! PostgreSQL ledger store
//!
//! A `PgLedgerTx` wraps one sqlx transaction. The repository impls in
//! `crate::repositories` run every query on that transaction, so a service
//! sees its own writes and commits them together.

use async_trait::async_trait;
use charge_core::traits::{LedgerStore, UnitOfWork};
use charge_core::{AppError, AppResult};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, instrument};

/// Ledger store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Unit of work over one database transaction
///
/// Dropping it without calling `commit` rolls the transaction back.
pub struct PgLedgerTx {
    pub(crate) tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Tx = PgLedgerTx;

    #[instrument(skip(self))]
    async fn begin(&self) -> AppResult<PgLedgerTx> {
        let tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin ledger transaction: {}", e);
            AppError::Transaction(format!("Failed to begin transaction: {}", e))
        })?;

        Ok(PgLedgerTx { tx })
    }
}

#[async_trait]
impl UnitOfWork for PgLedgerTx {
    #[instrument(skip(self))]
    async fn commit(self) -> AppResult<()> {
        self.tx.commit().await.map_err(|e| {
            error!("Failed to commit ledger transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        debug!("Ledger transaction committed");
        Ok(())
    }
}
