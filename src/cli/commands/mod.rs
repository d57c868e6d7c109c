//! CLI command dispatch and handlers
//!
//! Routes the selected action to its handler. Handlers write records to
//! the output stream and per-item diagnostics to stderr; only `main`
//! decides the exit status.

pub mod change;
pub mod check;
pub mod list;

use std::fs::File;
use std::io::{BufWriter, Write};

use tracing::debug;

use crate::cli::args::{Action, Cli};
use crate::engine::Engine;
use crate::error::{ConfigError, Result, ToolconfError};

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the engine cannot be set up or the handler fails.
pub async fn dispatch(cli: Cli) -> Result<()> {
    if let Action::ListOptions(name) | Action::ChangeOptions(name) = cli.action() {
        if name.trim().is_empty() {
            return Err(ToolconfError::Usage("component name must not be empty".to_string()));
        }
    }

    let engine = Engine::from_settings(cli.settings())?;
    if let Action::ChangeOptions(name) = cli.action() {
        // Produces no records; `--output` is left untouched.
        return change::run(&engine, name, std::io::stdin().lock()).await;
    }

    let mut out = open_output(&cli)?;
    let format = cli.format;

    let result = match cli.action() {
        Action::ListComponents => list::components(&engine, format, &mut out),
        Action::ListOptions(name) => list::options(&engine, name, format, &mut out).await,
        Action::ChangeOptions(_) => Ok(()),
        Action::ApplyDefaults => check::apply_defaults(&engine, format, &mut out).await,
        Action::CheckConfig(file) => check::check_config(&engine, file, format, &mut out).await,
    };

    out.flush()?;
    result
}

fn open_output(cli: &Cli) -> Result<Box<dyn Write>> {
    match &cli.output {
        Some(path) => {
            debug!(path = %path.display(), "writing records to file");
            let file = File::create(path).map_err(|source| ConfigError::Write {
                path: path.clone(),
                source,
            })?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout().lock())),
    }
}
