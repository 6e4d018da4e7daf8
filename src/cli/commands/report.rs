use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Subcommand};
use serde_json::json;

use crate::cli::utils::{connect_store, output_success};
use crate::cli::OutputFormat;
use crate::database::{RecordFilter, Store};
use crate::services::report::{self, parse_range, report_filename, ReportKind};
use crate::types::DateRange;

#[derive(Args)]
pub struct RangeArgs {
    #[arg(long, help = "First day, YYYY-MM-DD")]
    pub start: String,
    #[arg(long, help = "Last day, YYYY-MM-DD")]
    pub end: String,
    #[arg(long, help = "Output file (defaults to <kind>_report_<start>_to_<end>.pdf)")]
    pub out: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    #[command(about = "Approved progress updates")]
    Progress {
        #[command(flatten)]
        range: RangeArgs,
    },

    #[command(about = "Approved payments")]
    Payments {
        #[command(flatten)]
        range: RangeArgs,
    },
}

pub async fn handle(cmd: ReportCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let (kind, args) = match cmd {
        ReportCommands::Progress { range } => (ReportKind::Progress, range),
        ReportCommands::Payments { range } => (ReportKind::Payments, range),
    };
    let (start, end) = parse_range(Some(&args.start), Some(&args.end)).map_err(anyhow::Error::msg)?;
    let filter = RecordFilter::approved_between(DateRange::between(start, end));

    let (_, store) = connect_store().await?;
    let report = match kind {
        ReportKind::Progress => {
            let records = store.list_progress(&filter).await?;
            let uploaders: HashMap<_, _> = store
                .list_accounts()
                .await?
                .into_iter()
                .map(|a| (a.id, a.username))
                .collect();
            report::progress_report(start, end, &records, &uploaders)
        }
        ReportKind::Payments => {
            let records = store.list_payments(&filter).await?;
            report::payment_report(start, end, &records)
        }
    };
    store.close().await;

    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(report_filename(kind, start, end)));
    let count = report.entry_count();

    let bytes = report::render_pdf(report).await?;
    tokio::fs::write(&out, &bytes)
        .await
        .with_context(|| format!("writing {}", out.display()))?;

    output_success(
        output_format,
        &format!("Wrote {} records to {}", count, out.display()),
        Some(json!({ "path": out, "records": count, "bytes": bytes.len() })),
    )
}
