//! Approved-record reports: a pure layout step and a PDF rendering step.

mod pdf;

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Payment, Progress, RecordStatus};
use crate::types::{parse_date, DateRange};

pub use pdf::{render_pdf, render_pdf_blocking};

pub const RECORDS_PER_PAGE: usize = 20;
pub const FOOTER: &str = "This is a system-generated report and does not require signatures.";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("PDF rendering failed: {0}")]
    Pdf(String),

    #[error("Report task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Progress,
    Payments,
}

impl ReportKind {
    /// Stem used in download filenames.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Progress => "progress",
            ReportKind::Payments => "payment",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ReportKind::Progress => "Iruvade Project Management: Progress Report",
            ReportKind::Payments => "Iruvade Project Management: Payment Report",
        }
    }
}

/// One record block: a heading line followed by indented detail lines.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub heading: String,
    pub details: Vec<String>,
}

/// Laid-out report, independent of the output format.
#[derive(Debug, Clone)]
pub struct Report {
    pub kind: ReportKind,
    pub title: String,
    pub duration: String,
    /// Logical pages of at most [`RECORDS_PER_PAGE`] entries.
    pub pages: Vec<Vec<ReportEntry>>,
    pub summary: String,
    pub footer: &'static str,
}

impl Report {
    pub fn entry_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }
}

/// Validates the `start`/`end` bounds of a report request.
pub fn parse_range(start: Option<&str>, end: Option<&str>) -> Result<(NaiveDate, NaiveDate), String> {
    let (Some(start), Some(end)) = (start, end) else {
        return Err("Start and end dates are required".to_string());
    };
    let start = parse_date(start).ok_or_else(|| format!("Invalid start date '{}'", start))?;
    let end = parse_date(end).ok_or_else(|| format!("Invalid end date '{}'", end))?;
    if start > end {
        return Err("Start date must not be after end date".to_string());
    }
    Ok((start, end))
}

pub fn report_filename(kind: ReportKind, start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "{}_report_{}_to_{}.pdf",
        kind.as_str(),
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    )
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

/// Strips non-ASCII characters and collapses whitespace; blank becomes `-`.
pub fn sanitize(text: &str) -> String {
    let ascii: String = text.chars().filter(char::is_ascii).collect();
    let collapsed = ascii.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        "-".to_string()
    } else {
        collapsed
    }
}

fn approved_in_range<'a, T>(
    records: &'a [T],
    range: DateRange,
    status: impl Fn(&T) -> RecordStatus,
    date: impl Fn(&T) -> NaiveDate,
) -> Vec<&'a T> {
    let mut selected: Vec<&T> = records
        .iter()
        .filter(|r| status(r) == RecordStatus::Approved && range.contains(date(r)))
        .collect();
    // Stable, so records sharing a date keep their incoming order.
    selected.sort_by_key(|r| date(r));
    selected
}

fn paginate(entries: Vec<ReportEntry>) -> Vec<Vec<ReportEntry>> {
    if entries.is_empty() {
        return vec![Vec::new()];
    }
    entries
        .chunks(RECORDS_PER_PAGE)
        .map(<[ReportEntry]>::to_vec)
        .collect()
}

fn duration(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} to {}", format_date(start), format_date(end))
}

pub fn progress_report(
    start: NaiveDate,
    end: NaiveDate,
    records: &[Progress],
    uploaders: &HashMap<Uuid, String>,
) -> Report {
    let selected = approved_in_range(records, DateRange::between(start, end), |p| p.status, |p| p.date);

    let entries: Vec<ReportEntry> = selected
        .iter()
        .map(|p| ReportEntry {
            heading: format!("Progress ID: {}", p.progress_id),
            details: vec![
                format!("Date: {}", format_date(p.date)),
                format!("Description: {}", sanitize(&p.description)),
                format!(
                    "Uploaded by: {}",
                    uploaders.get(&p.uploaded_by).map(|name| sanitize(name)).unwrap_or_else(|| "-".to_string())
                ),
                format!("Status: {}", p.status),
            ],
        })
        .collect();

    let summary = format!(
        "Total Approved Progress Updates: {} (From {} to {})",
        entries.len(),
        format_date(start),
        format_date(end)
    );

    Report {
        kind: ReportKind::Progress,
        title: ReportKind::Progress.title().to_string(),
        duration: duration(start, end),
        pages: paginate(entries),
        summary,
        footer: FOOTER,
    }
}

pub fn payment_report(start: NaiveDate, end: NaiveDate, records: &[Payment]) -> Report {
    let selected = approved_in_range(records, DateRange::between(start, end), |p| p.status, |p| p.date);

    let total: Decimal = selected.iter().map(|p| p.amount).sum();
    let entries: Vec<ReportEntry> = selected
        .iter()
        .map(|p| ReportEntry {
            heading: format!("Payment ID: {}", sanitize(&p.payment_id)),
            details: vec![
                format!("Date: {}", format_date(p.date)),
                format!("Amount: Rs {:.2}", p.amount),
                format!("Description: {}", sanitize(p.description.as_deref().unwrap_or_default())),
                format!("Remarks: {}", sanitize(p.remarks.as_deref().unwrap_or_default())),
            ],
        })
        .collect();

    let summary = format!(
        "Total Payment: Rs {:.2} (From {} to {})",
        total,
        format_date(start),
        format_date(end)
    );

    Report {
        kind: ReportKind::Payments,
        title: ReportKind::Payments.title().to_string(),
        duration: duration(start, end),
        pages: paginate(entries),
        summary,
        footer: FOOTER,
    }
}

/// Row of the approved-payments ledger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub serial_no: usize,
    #[serde(rename = "paymentID")]
    pub payment_id: String,
    pub date: NaiveDate,
    pub amount_paid: Decimal,
    pub total_paid: Decimal,
    pub description: Option<String>,
    pub remarks: Option<String>,
}

/// Approved payments in date order with a running total.
pub fn payment_ledger(records: &[Payment], range: DateRange) -> Vec<LedgerEntry> {
    let mut total = Decimal::ZERO;
    approved_in_range(records, range, |p| p.status, |p| p.date)
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            total += p.amount;
            LedgerEntry {
                serial_no: i + 1,
                payment_id: p.payment_id.clone(),
                date: p.date,
                amount_paid: p.amount,
                total_paid: total,
                description: p.description.clone(),
                remarks: p.remarks.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn progress(n: i64, date: &str, status: RecordStatus, uploader: Uuid) -> Progress {
        Progress {
            id: Uuid::new_v4(),
            progress_id: crate::models::progress::progress_id(n),
            date: d(date),
            description: format!("Slab \u{2013} level {}", n),
            zip: None,
            uploaded_by: uploader,
            status,
            approved_by: None,
            approved_at: None,
            comments: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn payment(id: &str, date: &str, amount: &str, status: RecordStatus) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            payment_id: id.to_string(),
            date: d(date),
            amount: Decimal::from_str(amount).unwrap(),
            description: None,
            remarks: Some("  cheque\n #12 ".into()),
            created_by: Uuid::new_v4(),
            status,
            approved_by: None,
            approved_at: None,
            comments: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn range_bounds_are_validated() {
        assert_eq!(
            parse_range(Some("2024-01-01"), Some("2024-01-31")),
            Ok((d("2024-01-01"), d("2024-01-31")))
        );
        assert!(parse_range(Some("2024-01-01"), None).is_err());
        assert!(parse_range(Some("yesterday"), Some("2024-01-31")).is_err());
        assert!(parse_range(Some("2024-02-01"), Some("2024-01-31")).is_err());
    }

    #[test]
    fn sanitize_strips_non_ascii() {
        assert_eq!(sanitize("Slab \u{2013} level\t2 "), "Slab level 2");
        assert_eq!(sanitize("\u{0939}\u{093f}"), "-");
    }

    #[test]
    fn progress_report_paginates_in_date_order() {
        let uploader = Uuid::new_v4();
        let names = HashMap::from([(uploader, "Ravi".to_string())]);
        let mut records: Vec<Progress> = (1..=45)
            .map(|n| progress(n, &format!("2024-01-{:02}", n % 31 + 1), RecordStatus::Approved, uploader))
            .collect();
        records.push(progress(99, "2024-01-10", RecordStatus::Pending, uploader));
        records.push(progress(100, "2024-03-01", RecordStatus::Approved, uploader));

        let report = progress_report(d("2024-01-01"), d("2024-01-31"), &records, &names);
        assert_eq!(report.pages.len(), 3);
        assert_eq!(report.pages[0].len(), 20);
        assert_eq!(report.pages[2].len(), 5);
        assert_eq!(report.entry_count(), 45);
        assert_eq!(
            report.summary,
            "Total Approved Progress Updates: 45 (From 01 Jan 2024 to 31 Jan 2024)"
        );

        let dates: Vec<&String> = report.pages.iter().flatten().map(|e| &e.details[0]).collect();
        assert_eq!(dates.first().unwrap().as_str(), "Date: 01 Jan 2024");
        assert_eq!(dates.last().unwrap().as_str(), "Date: 31 Jan 2024");
        assert_eq!(report.pages[0][0].details[1], "Description: Slab level 31");
        assert_eq!(report.pages[0][0].details[2], "Uploaded by: Ravi");
    }

    #[test]
    fn empty_report_still_has_one_page() {
        let report = payment_report(d("2024-01-01"), d("2024-01-31"), &[]);
        assert_eq!(report.pages.len(), 1);
        assert_eq!(report.summary, "Total Payment: Rs 0.00 (From 01 Jan 2024 to 31 Jan 2024)");
    }

    #[test]
    fn payment_report_totals_approved_amounts() {
        let records = vec![
            payment("P-2", "2024-01-15", "1500", RecordStatus::Approved),
            payment("P-1", "2024-01-02", "250.5", RecordStatus::Approved),
            payment("P-3", "2024-01-20", "999", RecordStatus::Rejected),
        ];
        let report = payment_report(d("2024-01-01"), d("2024-01-31"), &records);
        assert_eq!(report.entry_count(), 2);
        assert_eq!(report.pages[0][0].heading, "Payment ID: P-1");
        assert_eq!(report.pages[0][0].details[1], "Amount: Rs 250.50");
        assert_eq!(report.pages[0][0].details[2], "Description: -");
        assert_eq!(report.pages[0][0].details[3], "Remarks: cheque #12");
        assert!(report.summary.starts_with("Total Payment: Rs 1750.50"));
    }

    #[test]
    fn ledger_keeps_a_running_total() {
        let records = vec![
            payment("P-2", "2024-01-15", "100", RecordStatus::Approved),
            payment("P-1", "2024-01-02", "50", RecordStatus::Approved),
            payment("P-3", "2024-01-03", "70", RecordStatus::Pending),
        ];
        let ledger = payment_ledger(&records, DateRange::default());
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].serial_no, 1);
        assert_eq!(ledger[0].payment_id, "P-1");
        assert_eq!(ledger[1].total_paid, Decimal::from(150));
    }

    #[test]
    fn filenames_name_kind_and_range() {
        assert_eq!(
            report_filename(ReportKind::Payments, d("2024-01-01"), d("2024-01-31")),
            "payment_report_2024-01-01_to_2024-01-31.pdf"
        );
    }
}
