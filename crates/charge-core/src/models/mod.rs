//! Domain models for the charge ledger
//!
//! The ledger is a strict ownership tree: a bill run owns invoices, an invoice
//! owns licences and a licence owns transactions. Every level carries the same
//! line tallies so totals can be patched bottom-up.

pub mod bill_run;
pub mod invoice;
pub mod licence;
pub mod regime;
pub mod ruleset;
pub mod sequence_counter;
pub mod tally;
pub mod transaction;

pub use bill_run::{BillRun, BillRunStatus};
pub use invoice::{Invoice, InvoiceFlags, RebilledType, TransactionType};
pub use licence::Licence;
pub use regime::{is_valid_region, Regime, REGIONS};
pub use ruleset::Ruleset;
pub use sequence_counter::{CounterField, SequenceCounter};
pub use tally::{LineTallies, SummaryTallies};
pub use transaction::Transaction;
