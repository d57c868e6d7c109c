//! Runtime settings for one invocation.
//!
//! Built once by the front end and passed by reference into the engine;
//! nothing in the engine reads process-wide mutable state.

use std::path::PathBuf;
use std::time::Duration;

/// Default bound for a capability query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Default bound for a reload notification.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(1);

/// Default location of the system-wide rules file.
pub const DEFAULT_GLOBAL_CONFIG: &str = "/etc/gnupg/gpgconf.conf";

/// Default directory holding component executables.
pub const DEFAULT_BIN_DIR: &str = "/usr/bin";

/// Settings that shape engine behavior.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding component configuration files and sockets.
    pub config_root: PathBuf,

    /// Directory used to resolve relative executable paths.
    pub bin_dir: PathBuf,

    /// Alternate component catalog; the embedded one is used when `None`.
    pub catalog: Option<PathBuf>,

    /// System-wide rules file.
    pub global_config: PathBuf,

    /// Name matched against user patterns in the rules file.
    pub user: Option<String>,

    /// Suppress all writes.
    pub dry_run: bool,

    /// Ask running components to reload after a write.
    pub runtime: bool,

    /// Bound for a capability query.
    pub query_timeout: Duration,

    /// Bound for a reload notification.
    pub notify_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_root: default_config_root(),
            bin_dir: PathBuf::from(DEFAULT_BIN_DIR),
            catalog: None,
            global_config: PathBuf::from(DEFAULT_GLOBAL_CONFIG),
            user: current_user(),
            dry_run: false,
            runtime: false,
            query_timeout: env_duration_or("TOOLCONF_QUERY_TIMEOUT", DEFAULT_QUERY_TIMEOUT),
            notify_timeout: env_duration_or("TOOLCONF_NOTIFY_TIMEOUT", DEFAULT_NOTIFY_TIMEOUT),
        }
    }
}

impl Settings {
    /// Settings rooted at `config_root` with defaults for everything else.
    #[must_use]
    pub fn with_config_root(config_root: impl Into<PathBuf>) -> Self {
        Self {
            config_root: config_root.into(),
            ..Self::default()
        }
    }
}

/// `$GNUPGHOME`, else `~/.gnupg`, else `.gnupg` in the working directory.
#[must_use]
pub fn default_config_root() -> PathBuf {
    if let Some(home) = std::env::var_os("GNUPGHOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from(".gnupg"), |h| PathBuf::from(h).join(".gnupg"))
}

/// Login name from `$USER` or `$LOGNAME`.
#[must_use]
pub fn current_user() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .ok()
        .filter(|u| !u.is_empty())
}

/// Reads a duration such as `500ms` or `2s` from the environment.
fn env_duration_or(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|v| humantime::parse_duration(v.trim()).ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_config_root_overrides_root_only() {
        let settings = Settings::with_config_root("/tmp/toolconf-home");
        assert_eq!(settings.config_root, PathBuf::from("/tmp/toolconf-home"));
        assert_eq!(settings.bin_dir, PathBuf::from(DEFAULT_BIN_DIR));
        assert!(!settings.dry_run);
        assert!(!settings.runtime);
    }

    #[test]
    fn test_env_duration_falls_back_on_missing_var() {
        let d = env_duration_or("TOOLCONF_TEST_UNSET_DURATION_VAR", Duration::from_millis(250));
        assert_eq!(d, Duration::from_millis(250));
    }
}
