//! Data Transfer Objects (DTOs) for API requests and responses

pub mod bill_run;
pub mod common;
pub mod invoice;
pub mod transaction;

pub use bill_run::*;
pub use common::*;
pub use invoice::*;
pub use transaction::*;
