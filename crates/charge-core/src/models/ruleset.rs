//! Charging ruleset

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version of the charging rules a bill run is calculated under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Ruleset {
    /// Legacy rules
    #[default]
    Presroc,
    /// Current rules
    Sroc,
}

impl fmt::Display for Ruleset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ruleset::Presroc => write!(f, "presroc"),
            Ruleset::Sroc => write!(f, "sroc"),
        }
    }
}

impl FromStr for Ruleset {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "presroc" => Ok(Ruleset::Presroc),
            "sroc" => Ok(Ruleset::Sroc),
            _ => Err(AppError::InvalidRuleset(s.to_string())),
        }
    }
}
