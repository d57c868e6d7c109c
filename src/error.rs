//! Error types for `toolconf`
//!
//! This module provides the error hierarchy used by the configuration
//! engine together with the process exit codes the front end maps them to.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `toolconf` operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// Resource not found, validation failed, or a file could not be
    /// read or written
    pub const FAILURE: i32 = 1;

    /// Usage error (missing or extra arguments, unknown option)
    pub const USAGE_ERROR: i32 = 2;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `toolconf` operations.
///
/// Every engine operation returns this type; only `main` turns it into a
/// process exit status.
#[derive(Debug, Error)]
pub enum ToolconfError {
    /// Malformed invocation
    #[error("usage error: {0}")]
    Usage(String),

    /// Unknown component name
    #[error("component not found: {name}{}", suggestion_suffix(.suggestion.as_deref()))]
    NotFound {
        /// Name that was looked up
        name: String,
        /// Closest registered name, if any is similar enough
        suggestion: Option<String>,
    },

    /// Component executable could not be queried
    #[error("component '{component}' is unavailable: {source}")]
    ComponentUnavailable {
        /// Component name
        component: String,
        /// Underlying provider failure
        #[source]
        source: ProviderError,
    },

    /// One or more items failed validation
    #[error("{failures} validation error(s)")]
    Validation {
        /// Aggregated number of failed items
        failures: usize,
    },

    /// Configuration file error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Component catalog could not be parsed
    #[error("invalid component catalog: {0}")]
    Catalog(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ToolconfError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::NotFound { .. }
            | Self::ComponentUnavailable { .. }
            | Self::Validation { .. }
            | Self::Config(_)
            | Self::Catalog(_)
            | Self::Io(_)
            | Self::Json(_) => ExitCode::FAILURE,
        }
    }
}

fn suggestion_suffix(suggestion: Option<&str>) -> String {
    suggestion.map_or_else(String::new, |s| format!(" (did you mean '{s}'?)"))
}

fn format_timeout(timeout: &std::time::Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*timeout)
}

// ============================================================================
// Configuration File Errors
// ============================================================================

/// Errors reading, parsing, or writing configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File exists but could not be read
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path to the configuration file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File could not be written or replaced
    #[error("cannot write {path}: {source}")]
    Write {
        /// Path to the configuration file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid UTF-8 text
    #[error("{path}: line {line} is not valid UTF-8")]
    InvalidEncoding {
        /// Path to the configuration file
        path: PathBuf,
        /// 1-based line number of the first offending line
        line: usize,
    },

    /// Explicitly requested file does not exist
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Global rules file contains errors
    #[error("{path}: {count} error(s) in global configuration")]
    Rules {
        /// Path to the rules file
        path: PathBuf,
        /// Number of rule errors found
        count: usize,
    },
}

// ============================================================================
// Capability Provider Errors
// ============================================================================

/// Failures while querying a component executable for its options.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Executable could not be started
    #[error("failed to spawn {program}: {message}")]
    SpawnFailed {
        /// Executable path
        program: PathBuf,
        /// Error message from the OS
        message: String,
    },

    /// Query did not finish within the allotted time
    #[error("query timed out after {}", format_timeout(.timeout))]
    Timeout {
        /// Configured bound
        timeout: std::time::Duration,
    },

    /// Executable exited unsuccessfully
    #[error("exited with status {code:?}: {stderr}")]
    NonZeroExit {
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Captured stderr
        stderr: String,
    },

    /// Output could not be interpreted
    #[error("invalid capability output: {0}")]
    InvalidOutput(String),
}

// ============================================================================
// Change Protocol Errors
// ============================================================================

/// Per-line failures of the change protocol.
///
/// These never abort a batch; they are collected and reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeError {
    /// Line does not have the `name:flags:value` shape
    #[error("malformed change request '{0}'")]
    Malformed(String),

    /// Option is not part of the component schema
    #[error("unknown option '{name}'{}", suggestion_suffix(.suggestion.as_deref()))]
    UnknownOption {
        /// Requested option name
        name: String,
        /// Closest schema name, if any is similar enough
        suggestion: Option<String>,
    },

    /// Flags field is not a recognized combination
    #[error("invalid flags '{0}'")]
    InvalidFlags(String),

    /// Option is locked against changes
    #[error("option '{0}' may not be changed")]
    NoChangeAllowed(String),

    /// A value was supplied together with the use-default flag
    #[error("value given for option '{0}' with use-default flag")]
    ValueWithDefault(String),

    /// Value does not match the option type
    #[error("invalid value '{value}' for option '{option}': expected {expected}")]
    TypeMismatch {
        /// Option name
        option: String,
        /// Offending value text
        value: String,
        /// Description of the expected type
        expected: &'static str,
    },
}

// ============================================================================
// Runtime Notifier Errors
// ============================================================================

/// Failures of the advisory reload notification. Only ever logged.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Component declares no reload mechanism
    #[error("component '{0}' does not support runtime reload")]
    Unsupported(String),

    /// Control socket could not be reached
    #[error("cannot reach control socket {path}: {message}")]
    Connect {
        /// Socket path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Running instance answered with an error
    #[error("reload rejected: {0}")]
    Rejected(String),

    /// Pid file missing or unreadable
    #[error("invalid pid file {path}: {message}")]
    PidFile {
        /// Pid file path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Signal delivery failed
    #[error("failed to signal process {pid}: {message}")]
    Signal {
        /// Target process id
        pid: i32,
        /// Error message
        message: String,
    },

    /// No answer within the bounded wait
    #[error("no response within {}", format_timeout(.0))]
    Timeout(std::time::Duration),
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single issue found while checking configuration state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Where the issue was found (e.g. "gpg.conf:12" or "gpg-agent")
    pub location: String,
    /// Description of the issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl ValidationIssue {
    /// Creates an error-severity issue.
    pub fn error(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    /// Creates a warning-severity issue.
    pub fn warning(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}: {}", self.location, prefix, self.message)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Counts towards a failing outcome
    Error,
    /// Reported but does not affect the outcome
    Warning,
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `toolconf` operations.
pub type Result<T> = std::result::Result<T, ToolconfError>;

// ============================================================================
// Tests
// ============================================================================
