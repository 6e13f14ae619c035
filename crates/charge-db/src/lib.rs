//! Charge Ledger Database Layer
//!
//! Ledger stores implementing the unit-of-work traits from `charge-core`:
//!
//! - `PgLedgerStore`: PostgreSQL via sqlx, one database transaction per unit of work
//! - `MemoryLedgerStore`: serialized in-memory store for tests, behind the `memory` feature
//!
//! Tables are expected to exist; schema management lives outside this crate.

#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod pool;
pub mod repositories;
pub mod store;

#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryLedgerStore;
pub use pool::create_pool;
pub use store::{PgLedgerStore, PgLedgerTx};

// Re-export commonly used types
pub use charge_core::{AppError, AppResult};
pub use sqlx::{PgPool, Postgres};
