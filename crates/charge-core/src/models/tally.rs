//! Running tallies carried by bill runs, invoices and licences
//!
//! All values are integers in minor currency units. Tallies only ever change
//! by adding a delta of the same shape, which keeps every mutation commutative.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Neg, Sub};

/// Credit/debit/zero line counts and values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineTallies {
    pub credit_line_count: i64,
    pub credit_line_value: i64,
    pub debit_line_count: i64,
    pub debit_line_value: i64,
    pub zero_line_count: i64,
    pub subject_to_minimum_charge_count: i64,
    pub subject_to_minimum_charge_credit_value: i64,
    pub subject_to_minimum_charge_debit_value: i64,
}

impl LineTallies {
    /// Tallies contributed by a single transaction line
    ///
    /// A zero value line only bumps `zero_line_count`; minimum charge tallies
    /// follow the credit flag regardless of value.
    pub fn for_line(charge_value: i64, charge_credit: bool, subject_to_minimum_charge: bool) -> Self {
        let mut tallies = Self::default();

        if charge_value == 0 {
            tallies.zero_line_count = 1;
        } else if charge_credit {
            tallies.credit_line_count = 1;
            tallies.credit_line_value = charge_value;
        } else {
            tallies.debit_line_count = 1;
            tallies.debit_line_value = charge_value;
        }

        if subject_to_minimum_charge {
            tallies.subject_to_minimum_charge_count = 1;
            if charge_credit {
                tallies.subject_to_minimum_charge_credit_value = charge_value;
            } else {
                tallies.subject_to_minimum_charge_debit_value = charge_value;
            }
        }

        tallies
    }

    /// Debit value minus credit value
    pub fn net_total(&self) -> i64 {
        self.debit_line_value - self.credit_line_value
    }

    /// Number of credit and debit lines (zero value lines excluded)
    pub fn non_zero_line_count(&self) -> i64 {
        self.credit_line_count + self.debit_line_count
    }

    /// Number of lines of any kind
    pub fn line_count(&self) -> i64 {
        self.non_zero_line_count() + self.zero_line_count
    }

    /// Same tallies with credits and debits swapped
    pub fn inverted(&self) -> Self {
        Self {
            credit_line_count: self.debit_line_count,
            credit_line_value: self.debit_line_value,
            debit_line_count: self.credit_line_count,
            debit_line_value: self.credit_line_value,
            zero_line_count: self.zero_line_count,
            subject_to_minimum_charge_count: self.subject_to_minimum_charge_count,
            subject_to_minimum_charge_credit_value: self.subject_to_minimum_charge_debit_value,
            subject_to_minimum_charge_debit_value: self.subject_to_minimum_charge_credit_value,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for LineTallies {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            credit_line_count: self.credit_line_count + rhs.credit_line_count,
            credit_line_value: self.credit_line_value + rhs.credit_line_value,
            debit_line_count: self.debit_line_count + rhs.debit_line_count,
            debit_line_value: self.debit_line_value + rhs.debit_line_value,
            zero_line_count: self.zero_line_count + rhs.zero_line_count,
            subject_to_minimum_charge_count: self.subject_to_minimum_charge_count
                + rhs.subject_to_minimum_charge_count,
            subject_to_minimum_charge_credit_value: self.subject_to_minimum_charge_credit_value
                + rhs.subject_to_minimum_charge_credit_value,
            subject_to_minimum_charge_debit_value: self.subject_to_minimum_charge_debit_value
                + rhs.subject_to_minimum_charge_debit_value,
        }
    }
}

impl AddAssign for LineTallies {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Neg for LineTallies {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            credit_line_count: -self.credit_line_count,
            credit_line_value: -self.credit_line_value,
            debit_line_count: -self.debit_line_count,
            debit_line_value: -self.debit_line_value,
            zero_line_count: -self.zero_line_count,
            subject_to_minimum_charge_count: -self.subject_to_minimum_charge_count,
            subject_to_minimum_charge_credit_value: -self.subject_to_minimum_charge_credit_value,
            subject_to_minimum_charge_debit_value: -self.subject_to_minimum_charge_debit_value,
        }
    }
}

impl Sub for LineTallies {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

/// Bill-run level summary, only maintained once a bill run is generated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryTallies {
    pub credit_note_count: i64,
    pub credit_note_value: i64,
    pub invoice_count: i64,
    pub invoice_value: i64,
}

impl SummaryTallies {
    /// Net value of the summary (invoices minus credit notes)
    pub fn net_total(&self) -> i64 {
        self.invoice_value - self.credit_note_value
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for SummaryTallies {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            credit_note_count: self.credit_note_count + rhs.credit_note_count,
            credit_note_value: self.credit_note_value + rhs.credit_note_value,
            invoice_count: self.invoice_count + rhs.invoice_count,
            invoice_value: self.invoice_value + rhs.invoice_value,
        }
    }
}

impl AddAssign for SummaryTallies {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Neg for SummaryTallies {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            credit_note_count: -self.credit_note_count,
            credit_note_value: -self.credit_note_value,
            invoice_count: -self.invoice_count,
            invoice_value: -self.invoice_value,
        }
    }
}

impl Sub for SummaryTallies {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit_line() {
        let t = LineTallies::for_line(1500, false, true);
        assert_eq!(t.debit_line_count, 1);
        assert_eq!(t.debit_line_value, 1500);
        assert_eq!(t.credit_line_count, 0);
        assert_eq!(t.subject_to_minimum_charge_count, 1);
        assert_eq!(t.subject_to_minimum_charge_debit_value, 1500);
        assert_eq!(t.net_total(), 1500);
    }

    #[test]
    fn test_zero_line() {
        let t = LineTallies::for_line(0, true, false);
        assert_eq!(t.zero_line_count, 1);
        assert_eq!(t.non_zero_line_count(), 0);
        assert_eq!(t.line_count(), 1);
    }

    #[test]
    fn test_inverted_swaps_credit_and_debit() {
        let t = LineTallies::for_line(700, true, true) + LineTallies::for_line(200, false, false);
        let inv = t.inverted();

        assert_eq!(inv.debit_line_value, 700);
        assert_eq!(inv.credit_line_value, 200);
        assert_eq!(inv.subject_to_minimum_charge_debit_value, 700);
        assert_eq!(inv.net_total(), -t.net_total());
        assert_eq!(inv.inverted(), t);
    }

    #[test]
    fn test_add_then_subtract_is_identity() {
        let a = LineTallies::for_line(300, false, false);
        let b = LineTallies::for_line(120, true, true);
        assert_eq!((a + b) - b, a);
        assert!((a - a).is_zero());
    }

    #[test]
    fn test_summary_arithmetic() {
        let s = SummaryTallies {
            credit_note_count: 1,
            credit_note_value: 400,
            invoice_count: 2,
            invoice_value: 1000,
        };
        assert_eq!(s.net_total(), 600);
        assert!((s - s).is_zero());
    }
}
