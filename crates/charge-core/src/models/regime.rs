//! Regime model
//!
//! A regime is a billing scheme (water abstraction, waste, ...). Regimes are
//! reference data; the ledger never mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Regions a bill run can be raised for
pub const REGIONS: [&str; 8] = ["A", "B", "E", "N", "S", "T", "W", "Y"];

/// Check that a region code is one of the known regions (case-insensitive)
pub fn is_valid_region(region: &str) -> bool {
    REGIONS.iter().any(|r| r.eq_ignore_ascii_case(region))
}

/// Regime entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Regime {
    /// Unique identifier
    pub id: Uuid,

    /// URL-safe identifier, e.g. `wrls`
    pub slug: String,

    /// Display name
    pub name: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Regime {
    /// Create a new regime
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            slug: slug.into(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_regions() {
        assert!(is_valid_region("A"));
        assert!(is_valid_region("w"));
        assert!(!is_valid_region("Z"));
        assert!(!is_valid_region("AB"));
        assert!(!is_valid_region(""));
    }
}
