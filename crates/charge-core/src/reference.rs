//! External reference formatting
//!
//! These formats are consumed by downstream billing systems and are bit-exact
//! contracts: padding widths and fixed characters must not change. Numbers are
//! zero padded but never truncated, so a counter that outgrows the pad width
//! simply yields a longer reference.

use crate::error::AppError;
use crate::models::{Ruleset, TransactionType};

fn checked_region(region: &str) -> Result<&str, AppError> {
    if region.len() == 1 && region.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(region)
    } else {
        Err(AppError::InvalidInput(format!(
            "Region must be a single letter, got '{}'",
            region
        )))
    }
}

/// Transaction file reference: `{prefix}{region}i{number}`, with a trailing `t` for sroc
///
/// ```
/// use charge_core::models::Ruleset;
/// use charge_core::reference::transaction_file_reference;
///
/// let reference = transaction_file_reference("nal", "R", Ruleset::Presroc, 50003)?;
/// assert_eq!(reference, "nalri50003");
/// # Ok::<(), charge_core::AppError>(())
/// ```
pub fn transaction_file_reference(
    prefix: &str,
    region: &str,
    ruleset: Ruleset,
    number: i64,
) -> Result<String, AppError> {
    let region = checked_region(region)?.to_lowercase();

    Ok(match ruleset {
        Ruleset::Presroc => format!("{}{}i{}", prefix, region, number),
        Ruleset::Sroc => format!("{}{}i{}t", prefix, region, number),
    })
}

/// Customer file reference: `{prefix}{region}c{number}`
pub fn customer_file_reference(prefix: &str, region: &str, number: i64) -> Result<String, AppError> {
    let region = checked_region(region)?.to_lowercase();
    Ok(format!("{}{}c{}", prefix, region, number))
}

/// Invoice transaction reference
///
/// presroc: `{REGION}A{C|I}1{number:06}`; sroc: `{REGION}A{C|I}{number:07}T`.
pub fn transaction_reference(
    region: &str,
    ruleset: Ruleset,
    transaction_type: TransactionType,
    number: i64,
) -> Result<String, AppError> {
    let region = checked_region(region)?.to_uppercase();
    let kind = transaction_type.as_char();

    Ok(match ruleset {
        Ruleset::Presroc => format!("{}A{}1{:06}", region, kind, number),
        Ruleset::Sroc => format!("{}A{}{:07}T", region, kind, number),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presroc_transaction_reference() {
        assert_eq!(
            transaction_reference("R", Ruleset::Presroc, TransactionType::CreditNote, 3).unwrap(),
            "RAC1000003"
        );
        assert_eq!(
            transaction_reference("a", Ruleset::Presroc, TransactionType::Invoice, 123456).unwrap(),
            "AAI1123456"
        );
    }

    #[test]
    fn test_sroc_transaction_reference() {
        assert_eq!(
            transaction_reference("R", Ruleset::Sroc, TransactionType::Invoice, 3).unwrap(),
            "RAI0000003T"
        );
    }

    #[test]
    fn test_reference_grows_past_pad_width() {
        assert_eq!(
            transaction_reference("W", Ruleset::Presroc, TransactionType::Invoice, 1234567).unwrap(),
            "WAI11234567"
        );
        assert_eq!(
            transaction_reference("W", Ruleset::Sroc, TransactionType::CreditNote, 12345678).unwrap(),
            "WAC12345678T"
        );
    }

    #[test]
    fn test_transaction_file_reference() {
        assert_eq!(
            transaction_file_reference("nal", "R", Ruleset::Presroc, 50003).unwrap(),
            "nalri50003"
        );
        assert_eq!(
            transaction_file_reference("nal", "R", Ruleset::Sroc, 50003).unwrap(),
            "nalri50003t"
        );
        assert_eq!(
            transaction_file_reference("nal", "R", Ruleset::Presroc, 3).unwrap(),
            "nalri3"
        );
    }

    #[test]
    fn test_customer_file_reference() {
        assert_eq!(customer_file_reference("nal", "A", 50001).unwrap(), "nalac50001");
    }

    #[test]
    fn test_malformed_region_is_rejected() {
        assert!(matches!(
            transaction_reference("AB", Ruleset::Presroc, TransactionType::Invoice, 1),
            Err(AppError::InvalidInput(_))
        ));
        assert!(transaction_file_reference("nal", "", Ruleset::Sroc, 1).is_err());
        assert!(customer_file_reference("nal", "1", 1).is_err());
    }

    #[test]
    fn test_string_inputs_fail_fast() {
        // Callers holding raw strings parse first; both parse failures are caller errors
        assert!(matches!("foo".parse::<Ruleset>(), Err(AppError::InvalidRuleset(_))));
        assert!(matches!("X".parse::<TransactionType>(), Err(AppError::InvalidInput(_))));
    }
}
