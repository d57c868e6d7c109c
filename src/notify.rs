//! Runtime reload notification.
//!
//! After a configuration write the front end may ask a running instance
//! of the component to re-read its configuration. This is advisory: every
//! attempt is bounded by the notify timeout and failures are only logged.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::NotifyError;
use crate::registry::{Component, ReloadSpec};
use crate::settings::Settings;

/// Signal sent when a pid-file reload entry names none.
pub const DEFAULT_RELOAD_SIGNAL: &str = "SIGHUP";

/// Asks a running instance of `component` to reload, logging any failure.
pub async fn notify_reload(component: &Component, settings: &Settings) {
    match try_notify_reload(component, &settings.config_root, settings.notify_timeout).await {
        Ok(()) => info!(component = %component.name, "reload requested"),
        Err(e) => warn!(component = %component.name, error = %e, "runtime reload failed"),
    }
}

/// Sends the reload request and reports the outcome.
///
/// Relative socket and pid-file paths resolve against `config_root`.
///
/// # Errors
///
/// Returns a [`NotifyError`] if the component has no reload mechanism,
/// cannot be reached, rejects the request, or does not answer within
/// `timeout`.
pub async fn try_notify_reload(
    component: &Component,
    config_root: &Path,
    timeout: Duration,
) -> Result<(), NotifyError> {
    let Some(reload) = &component.reload else {
        return Err(NotifyError::Unsupported(component.name.clone()));
    };
    tokio::time::timeout(timeout, dispatch(reload, config_root))
        .await
        .map_err(|_| NotifyError::Timeout(timeout))?
}

async fn dispatch(reload: &ReloadSpec, config_root: &Path) -> Result<(), NotifyError> {
    match reload {
        ReloadSpec::Socket { socket, command } => {
            send_socket_command(&resolve(config_root, socket), command).await
        }
        ReloadSpec::Signal { pidfile, signal } => signal_pidfile(
            &resolve(config_root, pidfile),
            signal.as_deref().unwrap_or(DEFAULT_RELOAD_SIGNAL),
        ),
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

// ============================================================================
// Control socket
// ============================================================================

/// Line protocol: read the greeting, send the command, expect `OK`, then
/// say `BYE`.
#[cfg(unix)]
async fn send_socket_command(path: &Path, command: &str) -> Result<(), NotifyError> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::UnixStream;

    let connect_err = |message: String| NotifyError::Connect {
        path: path.to_path_buf(),
        message,
    };

    let stream = UnixStream::connect(path)
        .await
        .map_err(|e| connect_err(e.to_string()))?;
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let greeting = lines
        .next_line()
        .await
        .map_err(|e| connect_err(e.to_string()))?
        .ok_or_else(|| connect_err("connection closed before greeting".to_string()))?;
    if !is_ok(&greeting) {
        return Err(NotifyError::Rejected(greeting));
    }
    debug!(socket = %path.display(), greeting = %greeting, "connected to control socket");

    write_half
        .write_all(format!("{command}\n").as_bytes())
        .await
        .map_err(|e| connect_err(e.to_string()))?;
    let response = lines
        .next_line()
        .await
        .map_err(|e| connect_err(e.to_string()))?
        .unwrap_or_default();

    // Best effort; the request itself already succeeded or failed.
    let _ = write_half.write_all(b"BYE\n").await;

    if is_ok(&response) {
        Ok(())
    } else {
        Err(NotifyError::Rejected(response))
    }
}

#[cfg(not(unix))]
async fn send_socket_command(path: &Path, _command: &str) -> Result<(), NotifyError> {
    Err(NotifyError::Connect {
        path: path.to_path_buf(),
        message: "control sockets need a Unix platform".to_string(),
    })
}

fn is_ok(line: &str) -> bool {
    line == "OK" || line.starts_with("OK ")
}

// ============================================================================
// Pid file
// ============================================================================

#[cfg(unix)]
fn signal_pidfile(path: &Path, signal: &str) -> Result<(), NotifyError> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let pid_err = |message: String| NotifyError::PidFile {
        path: path.to_path_buf(),
        message,
    };
    let text = std::fs::read_to_string(path).map_err(|e| pid_err(e.to_string()))?;
    let pid = text
        .split_whitespace()
        .next()
        .and_then(|p| p.parse::<i32>().ok())
        .filter(|p| *p > 0)
        .ok_or_else(|| pid_err("no process id found".to_string()))?;

    let name = if signal.starts_with("SIG") {
        signal.to_string()
    } else {
        format!("SIG{signal}")
    };
    let signal = name.parse::<Signal>().map_err(|e| NotifyError::Signal {
        pid,
        message: format!("{name}: {e}"),
    })?;

    kill(Pid::from_raw(pid), signal).map_err(|e| NotifyError::Signal {
        pid,
        message: e.to_string(),
    })?;
    debug!(pid, signal = %name, "reload signal sent");
    Ok(())
}

#[cfg(not(unix))]
fn signal_pidfile(path: &Path, _signal: &str) -> Result<(), NotifyError> {
    Err(NotifyError::PidFile {
        path: path.to_path_buf(),
        message: "signals need a Unix platform".to_string(),
    })
}
