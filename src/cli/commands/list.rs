//! `--list-components` and `--list-options`.

use std::io::Write;

use crate::cli::args::OutputFormat;
use crate::engine::Engine;
use crate::error::Result;

/// Prints one record per registered component.
///
/// # Errors
///
/// Returns an error if the output cannot be written.
pub fn components(engine: &Engine, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    let records = engine.list_components();
    match format {
        OutputFormat::Colon => {
            for record in &records {
                writeln!(out, "{record}")?;
            }
        }
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&records)?)?,
    }
    Ok(())
}

/// Prints one record per option of the named component, in schema order.
///
/// # Errors
///
/// Returns an error if the component is unknown or cannot be read.
pub async fn options(
    engine: &Engine,
    name: &str,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let index = engine.find(name)?;
    let records = engine.list_options(index).await?;
    match format {
        OutputFormat::Colon => {
            for record in &records {
                writeln!(out, "{record}")?;
            }
        }
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&records)?)?,
    }
    Ok(())
}
