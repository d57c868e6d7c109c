//! `--change-options`.

use std::io::BufRead;

use crate::engine::Engine;
use crate::error::{Result, ToolconfError};

/// Reads change requests from `input` and applies them to the named
/// component.
///
/// Rejected lines are reported on stderr. Accepted changes are kept even
/// when some lines fail; the failure count then becomes the error.
///
/// # Errors
///
/// Returns an error if the component is unknown or unreadable, the file
/// cannot be written, or any request line was rejected.
pub async fn run(engine: &Engine, name: &str, input: impl BufRead) -> Result<()> {
    let index = engine.find(name)?;
    let lines = input.lines().collect::<std::io::Result<Vec<_>>>()?;

    let outcome = engine
        .change_options(index, lines.iter().map(String::as_str))
        .await?;

    for failure in &outcome.report.failures {
        eprintln!("toolconf: {name}: {failure}");
    }
    if outcome.report.is_success() {
        Ok(())
    } else {
        Err(ToolconfError::Validation {
            failures: outcome.report.failures.len(),
        })
    }
}
