use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use sitelens_core::models::CheckResult;

/// Output format of the final `check` report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Csv,
    Json,
}

/// Write results in input order; one CSV row or JSON array element per URL.
pub fn write_report<W: Write>(mut out: W, format: ReportFormat, results: &[CheckResult]) -> Result<()> {
    match format {
        ReportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for result in results {
                writer.serialize(result)?;
            }
            writer.flush()?;
        }
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut out, results)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
