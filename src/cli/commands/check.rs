//! `--check-config` and `--apply-defaults`.

use std::io::Write;
use std::path::Path;

use serde_json::json;

use crate::cli::args::OutputFormat;
use crate::engine::Engine;
use crate::error::{Result, Severity, ToolconfError};
use crate::validate::CheckReport;

/// Checks the rules file and every component.
///
/// # Errors
///
/// Returns [`ToolconfError::Validation`] if anything failed, or an error if
/// the rules file cannot be read.
pub async fn check_config(
    engine: &Engine,
    file: Option<&Path>,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let report = engine.check_config(file).await?;
    print_report(&report, format, out)?;
    outcome(&report)
}

/// Writes force-default values for every component.
///
/// # Errors
///
/// Returns [`ToolconfError::Validation`] if any component failed.
pub async fn apply_defaults(engine: &Engine, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    let report = engine.apply_defaults().await?;
    print_report(&report, format, out)?;
    outcome(&report)
}

fn outcome(report: &CheckReport) -> Result<()> {
    if report.is_success() {
        Ok(())
    } else {
        Err(ToolconfError::Validation {
            failures: report.error_count(),
        })
    }
}

fn print_report(report: &CheckReport, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    match format {
        OutputFormat::Colon => {
            for issue in report.issues() {
                writeln!(out, "{issue}")?;
            }
        }
        OutputFormat::Json => {
            let issues: Vec<_> = report
                .issues()
                .map(|i| {
                    json!({
                        "location": i.location,
                        "severity": match i.severity {
                            Severity::Error => "error",
                            Severity::Warning => "warning",
                        },
                        "message": i.message,
                    })
                })
                .collect();
            let components: Vec<_> = report
                .components
                .iter()
                .map(|c| {
                    json!({
                        "index": c.component,
                        "name": c.name,
                        "valid": c.is_valid(),
                        "defaults_applied": c.defaults_applied,
                        "written": c.written,
                    })
                })
                .collect();
            let doc = json!({
                "errors": report.error_count(),
                "warnings": report.warning_count(),
                "issues": issues,
                "components": components,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
        }
    }
    Ok(())
}
