//! Ledger arithmetic
//!
//! Pure functions over snapshots. Every mutation of a bill run, invoice or
//! licence is expressed as a patch that the storage layer adds to the stored
//! tallies, so concurrent patches compose regardless of order.

use crate::models::{BillRunStatus, Invoice, InvoiceFlags, Licence, LineTallies, SummaryTallies};

/// Invoices with a positive net total below this value are deminimis
pub const DEMINIMIS_LIMIT: i64 = 500;

/// Additive change to a bill run's tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TallyPatch {
    pub lines: LineTallies,
    /// Only present when the bill run's summary is maintained
    pub summary: Option<SummaryTallies>,
}

impl TallyPatch {
    pub fn lines(lines: LineTallies) -> Self {
        Self {
            lines,
            summary: None,
        }
    }

    pub fn with_summary(lines: LineTallies, summary: SummaryTallies) -> Self {
        Self {
            lines,
            summary: Some(summary),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_zero() && self.summary.map_or(true, |s| s.is_zero())
    }
}

/// Derive invoice flags from its tallies
///
/// `has_minimum_charge_adjustment` comes from an existence query against the
/// invoice's remaining transactions.
pub fn compute_invoice_flags(tallies: &LineTallies, has_minimum_charge_adjustment: bool) -> InvoiceFlags {
    let net = tallies.net_total();

    InvoiceFlags {
        zero_value_invoice: tallies.non_zero_line_count() == 0 && tallies.zero_line_count > 0,
        deminimis_invoice: net > 0 && net < DEMINIMIS_LIMIT && !has_minimum_charge_adjustment,
        minimum_charge_invoice: has_minimum_charge_adjustment,
    }
}

/// What an invoice adds to its bill run's summary
pub fn summary_contribution(invoice: &Invoice) -> SummaryTallies {
    summary_for(&invoice.tallies, &invoice.flags)
}

fn summary_for(tallies: &LineTallies, flags: &InvoiceFlags) -> SummaryTallies {
    if tallies.line_count() == 0 || flags.deminimis_invoice || flags.zero_value_invoice {
        return SummaryTallies::default();
    }

    let net = tallies.net_total();
    if net < 0 {
        SummaryTallies {
            credit_note_count: 1,
            credit_note_value: net.abs(),
            ..Default::default()
        }
    } else {
        SummaryTallies {
            invoice_count: 1,
            invoice_value: net,
            ..Default::default()
        }
    }
}

/// Summary for a whole bill run, computed at generate time
pub fn generate_summary<'a>(invoices: impl IntoIterator<Item = &'a Invoice>) -> SummaryTallies {
    invoices
        .into_iter()
        .map(summary_contribution)
        .fold(SummaryTallies::default(), |acc, s| acc + s)
}

/// Bill run patch for deleting `invoice`
///
/// Line tallies are always removed. The summary is only touched when the bill
/// run is generated and the invoice counted towards it.
pub fn delete_invoice_patch(bill_run_status: BillRunStatus, invoice: &Invoice) -> TallyPatch {
    let lines = -invoice.tallies;

    if bill_run_status.is_generated() && invoice.is_billable() {
        TallyPatch::with_summary(lines, -summary_contribution(invoice))
    } else {
        TallyPatch::lines(lines)
    }
}

/// Outcome of removing a licence from its invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LicenceRemoval {
    /// Added to the invoice's line tallies
    pub invoice_lines: LineTallies,
    /// Invoice flags after the removal
    pub invoice_flags: InvoiceFlags,
    /// Added to the bill run
    pub bill_run: TallyPatch,
    /// The invoice has no lines left and should be removed as well
    pub invoice_now_empty: bool,
}

/// Compute the patches for deleting `licence` from `invoice`
///
/// `has_minimum_charge_adjustment` must reflect the invoice's transactions
/// after the licence is gone. `bill_run_generated` is the status captured
/// before the bill run was marked pending.
pub fn remove_licence(
    bill_run_generated: bool,
    invoice: &Invoice,
    licence: &Licence,
    has_minimum_charge_adjustment: bool,
) -> LicenceRemoval {
    let remaining = invoice.tallies - licence.tallies;
    let invoice_flags = compute_invoice_flags(&remaining, has_minimum_charge_adjustment);
    let lines = -licence.tallies;

    let bill_run = if bill_run_generated {
        let shift = summary_for(&remaining, &invoice_flags) - summary_contribution(invoice);
        TallyPatch::with_summary(lines, shift)
    } else {
        TallyPatch::lines(lines)
    };

    LicenceRemoval {
        invoice_lines: lines,
        invoice_flags,
        bill_run,
        invoice_now_empty: remaining.line_count() == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn invoice(tallies: LineTallies) -> Invoice {
        let mut invoice = Invoice::new(Uuid::now_v7(), "CUST", 2022);
        invoice.tallies = tallies;
        invoice.flags = compute_invoice_flags(&tallies, false);
        invoice
    }

    #[test]
    fn test_zero_value_flag() {
        let zero = LineTallies::for_line(0, false, false);
        assert!(compute_invoice_flags(&zero, false).zero_value_invoice);

        let empty = LineTallies::default();
        assert!(!compute_invoice_flags(&empty, false).zero_value_invoice);

        let mixed = zero + LineTallies::for_line(100, false, false);
        assert!(!compute_invoice_flags(&mixed, false).zero_value_invoice);
    }

    #[test]
    fn test_deminimis_boundaries() {
        let below = LineTallies::for_line(499, false, false);
        assert!(compute_invoice_flags(&below, false).deminimis_invoice);

        let at = LineTallies::for_line(500, false, false);
        assert!(!compute_invoice_flags(&at, false).deminimis_invoice);

        let credit = LineTallies::for_line(100, true, false);
        assert!(!compute_invoice_flags(&credit, false).deminimis_invoice);

        let adjusted = compute_invoice_flags(&below, true);
        assert!(!adjusted.deminimis_invoice);
        assert!(adjusted.minimum_charge_invoice);
    }

    #[test]
    fn test_summary_contribution() {
        let credit = invoice(LineTallies::for_line(800, true, false));
        assert_eq!(
            summary_contribution(&credit),
            SummaryTallies {
                credit_note_count: 1,
                credit_note_value: 800,
                ..Default::default()
            }
        );

        let deminimis = invoice(LineTallies::for_line(200, false, false));
        assert!(summary_contribution(&deminimis).is_zero());

        let zero = invoice(LineTallies::for_line(0, false, false));
        assert!(summary_contribution(&zero).is_zero());
    }

    #[test]
    fn test_generate_summary() {
        let invoices = vec![
            invoice(LineTallies::for_line(1000, false, false)),
            invoice(LineTallies::for_line(700, true, false)),
            invoice(LineTallies::for_line(50, false, false)),
        ];

        let summary = generate_summary(&invoices);
        assert_eq!(summary.invoice_count, 1);
        assert_eq!(summary.invoice_value, 1000);
        assert_eq!(summary.credit_note_count, 1);
        assert_eq!(summary.credit_note_value, 700);
    }

    #[test]
    fn test_delete_invoice_patch_respects_generated() {
        let inv = invoice(LineTallies::for_line(1000, false, false));

        let before = delete_invoice_patch(BillRunStatus::Initialised, &inv);
        assert_eq!(before.lines.debit_line_value, -1000);
        assert_eq!(before.summary, None);

        let after = delete_invoice_patch(BillRunStatus::Generated, &inv);
        assert_eq!(after.lines.debit_line_count, -1);
        let summary = after.summary.unwrap();
        assert_eq!(summary.invoice_count, -1);
        assert_eq!(summary.invoice_value, -1000);
    }

    #[test]
    fn test_delete_deminimis_invoice_leaves_summary() {
        let inv = invoice(LineTallies::for_line(100, false, false));
        assert!(inv.flags.deminimis_invoice);

        let patch = delete_invoice_patch(BillRunStatus::Approved, &inv);
        assert_eq!(patch.summary, None);
        assert_eq!(patch.lines.debit_line_value, -100);
    }

    #[test]
    fn test_remove_licence_shifts_summary() {
        let kept = LineTallies::for_line(300, false, false);
        let removed = LineTallies::for_line(900, false, false);
        let inv = invoice(kept + removed);

        let mut licence = Licence::new(inv.bill_run_id, inv.id, "LIC/2");
        licence.tallies = removed;

        let removal = remove_licence(true, &inv, &licence, false);
        assert_eq!(removal.invoice_lines.debit_line_value, -900);
        assert!(removal.invoice_flags.deminimis_invoice);
        assert!(!removal.invoice_now_empty);

        // 1200 invoice becomes a 300 deminimis one: it drops out of the summary
        let summary = removal.bill_run.summary.unwrap();
        assert_eq!(summary.invoice_count, -1);
        assert_eq!(summary.invoice_value, -1200);
    }

    #[test]
    fn test_remove_last_licence() {
        let tallies = LineTallies::for_line(900, true, false);
        let inv = invoice(tallies);
        let mut licence = Licence::new(inv.bill_run_id, inv.id, "LIC/1");
        licence.tallies = tallies;

        let removal = remove_licence(false, &inv, &licence, false);
        assert!(removal.invoice_now_empty);
        assert_eq!(removal.bill_run.summary, None);
        assert_eq!(removal.bill_run.lines.credit_line_count, -1);

        // Once generated, the emptied invoice leaves the summary entirely
        let generated = remove_licence(true, &inv, &licence, false);
        let summary = generated.bill_run.summary.unwrap();
        assert_eq!(summary.credit_note_count, -1);
        assert_eq!(summary.credit_note_value, -900);
        assert_eq!(summary.invoice_count, 0);
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(TallyPatch::default().is_empty());
        assert!(!TallyPatch::lines(LineTallies::for_line(1, false, false)).is_empty());
    }
}
