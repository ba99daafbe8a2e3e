//! Markdown rendering of cases for the document index.
//!
//! Rendering is pure: the same case always produces the same name and text,
//! and that text is exactly what gets sent to the index.

use std::fmt::Write as _;

use crate::models::Case;

/// Document title used in the index
#[must_use]
pub fn case_document_name(case: &Case) -> String {
    format!("Case {} - {}", short_id(case), case.title)
}

/// Render a case as a Markdown document.
///
/// Timestamps and sync fields are left out so an edit that only touches sync
/// state does not change the document text.
#[must_use]
pub fn render_case_markdown(case: &Case) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {}", case.title);
    let _ = writeln!(output);
    let _ = writeln!(output, "- Case ID: {}", case.id);
    let _ = writeln!(output, "- Outcome: {}", case.outcome.label());
    if !case.loan_type.is_empty() {
        let _ = writeln!(output, "- Loan type: {}", case.loan_type);
    }
    if let Some(amount) = case.amount {
        let _ = writeln!(output, "- Amount: {}", group_thousands(amount));
    }
    if let Some(lender) = case.lender.as_deref() {
        let _ = writeln!(output, "- Lender: {lender}");
    }

    if !case.applicant_profile.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Applicant profile");
        let _ = writeln!(output);
        let _ = writeln!(output, "{}", case.applicant_profile);
    }

    if !case.key_factors.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Key factors");
        let _ = writeln!(output);
        for factor in &case.key_factors {
            let _ = writeln!(output, "- {factor}");
        }
    }

    if !case.notes.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Notes");
        let _ = writeln!(output);
        let _ = writeln!(output, "{}", case.notes);
    }

    output
}

/// Build a deterministic file name for `case export`.
#[must_use]
pub fn suggested_export_file_name(case: &Case) -> String {
    format!("case-{}.md", short_id(case))
}

fn short_id(case: &Case) -> String {
    // v7 ids share their leading timestamp bits; the tail is the distinctive part.
    let id = case.id.as_str();
    id[id.len() - 8..].to_string()
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if value < 0 {
        grouped.insert(0, '-');
    }
    grouped
}
