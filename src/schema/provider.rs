//! Capability providers.
//!
//! A provider reports which options a component executable actually
//! supports, with its compiled-in defaults and runtime flags. The engine
//! merges these reports over the static catalog table. [`ProcessProvider`]
//! asks the executable itself; [`StaticProvider`] serves canned answers so
//! schema and parser logic can be exercised without subprocesses.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::codec::unescape;
use super::{OptionFlags, OptionSpec};
use crate::error::ProviderError;
use crate::registry::Component;

/// Argument that makes a component print its option capabilities.
pub const LIST_ARG: &str = "--gpgconf-list";

/// Upper bound on captured capability output.
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// One option as reported by a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedOption {
    /// Option name.
    pub name: String,
    /// Reported flag bits.
    pub flags: OptionFlags,
    /// Reported default in file syntax, if any.
    pub default: Option<String>,
}

/// Source of dynamically reported option capabilities.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Queries `component` for its supported options.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] when the component cannot be queried.
    async fn query(&self, component: &Component) -> Result<Vec<ReportedOption>, ProviderError>;
}

// ============================================================================
// ProcessProvider
// ============================================================================

/// Runs `<executable> --gpgconf-list` under a timeout.
#[derive(Debug, Clone)]
pub struct ProcessProvider {
    timeout: Duration,
    config_root: Option<PathBuf>,
}

impl ProcessProvider {
    /// Creates a provider with the given query bound.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            config_root: None,
        }
    }

    /// Passes `root` to queried components as `GNUPGHOME`.
    #[must_use]
    pub fn with_config_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config_root = Some(root.into());
        self
    }
}

#[async_trait]
impl CapabilityProvider for ProcessProvider {
    async fn query(&self, component: &Component) -> Result<Vec<ReportedOption>, ProviderError> {
        debug!(
            component = %component.name,
            program = %component.executable.display(),
            "querying component capabilities"
        );

        let mut command = tokio::process::Command::new(&component.executable);
        command
            .arg(LIST_ARG)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(root) = &self.config_root {
            command.env("GNUPGHOME", root);
        }

        let child = command.spawn().map_err(|e| ProviderError::SpawnFailed {
            program: component.executable.clone(),
            message: e.to_string(),
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ProviderError::Timeout {
                timeout: self.timeout,
            })?
            .map_err(|e| ProviderError::SpawnFailed {
                program: component.executable.clone(),
                message: e.to_string(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(ProviderError::NonZeroExit {
                code: output.status.code(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            warn!(component = %component.name, stderr = %stderr, "capability query produced stderr output");
        }
        if output.stdout.len() > MAX_OUTPUT_SIZE {
            return Err(ProviderError::InvalidOutput(format!(
                "output exceeds {MAX_OUTPUT_SIZE} byte limit"
            )));
        }

        let text = String::from_utf8(output.stdout)
            .map_err(|_| ProviderError::InvalidOutput("output is not UTF-8".to_string()))?;
        parse_capability_output(&text)
    }
}

/// Parses `name:flags:default[:...]` lines.
///
/// # Errors
///
/// Returns [`ProviderError::InvalidOutput`] on a line without a numeric
/// flags field.
pub fn parse_capability_output(text: &str) -> Result<Vec<ReportedOption>, ProviderError> {
    let mut reported = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split(':');
        let name = fields.next().unwrap_or_default();
        let flags = fields
            .next()
            .and_then(|f| f.parse::<u32>().ok())
            .ok_or_else(|| {
                ProviderError::InvalidOutput(format!("line {}: expected NAME:FLAGS", idx + 1))
            })?;
        if name.is_empty() {
            return Err(ProviderError::InvalidOutput(format!(
                "line {}: empty option name",
                idx + 1
            )));
        }
        let flags = OptionFlags::from_bits_truncate(flags);
        let default = fields
            .next()
            .filter(|d| flags.contains(OptionFlags::DEFAULT) && !d.is_empty())
            .map(|d| unescape(d.strip_prefix('"').unwrap_or(d)));
        reported.push(ReportedOption {
            name: name.to_string(),
            flags,
            default,
        });
    }
    Ok(reported)
}

/// Merges reported capabilities over a static option table.
///
/// Reported defaults replace static ones and the runtime bit is added.
/// Reported names absent from the table are ignored.
#[must_use]
pub fn merge_reported(schema: &[OptionSpec], reported: &[ReportedOption]) -> Vec<OptionSpec> {
    let by_name: HashMap<&str, &ReportedOption> =
        reported.iter().map(|r| (r.name.as_str(), r)).collect();

    for r in reported {
        if !schema.iter().any(|s| s.name == r.name) {
            debug!(option = %r.name, "ignoring reported option missing from catalog");
        }
    }

    schema
        .iter()
        .map(|spec| {
            let mut spec = spec.clone();
            if let Some(r) = by_name.get(spec.name.as_str()) {
                spec.runtime |= r.flags.contains(OptionFlags::RUNTIME);
                if let Some(default) = &r.default {
                    spec.default = Some(default.clone());
                }
            }
            spec
        })
        .collect()
}

// ============================================================================
// StaticProvider
// ============================================================================

/// In-memory provider keyed by component name.
///
/// Components without an entry report nothing.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    entries: HashMap<String, Result<Vec<ReportedOption>, String>>,
}

impl StaticProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a successful report for `component`.
    #[must_use]
    pub fn with_report(mut self, component: &str, options: Vec<ReportedOption>) -> Self {
        self.entries.insert(component.to_string(), Ok(options));
        self
    }

    /// Makes queries for `component` fail.
    #[must_use]
    pub fn with_failure(mut self, component: &str, message: &str) -> Self {
        self.entries
            .insert(component.to_string(), Err(message.to_string()));
        self
    }
}

#[async_trait]
impl CapabilityProvider for StaticProvider {
    async fn query(&self, component: &Component) -> Result<Vec<ReportedOption>, ProviderError> {
        match self.entries.get(&component.name) {
            Some(Ok(options)) => Ok(options.clone()),
            Some(Err(message)) => Err(ProviderError::SpawnFailed {
                program: component.executable.clone(),
                message: message.clone(),
            }),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OptionType;

    #[test]
    fn test_parse_capability_output() {
        let text = "default-cache-ttl:24:600:\nverbose:0:\nkeyserver:16:\"hkps%3a//a.example\n\n";
        let reported = parse_capability_output(text).unwrap();
        assert_eq!(reported.len(), 3);
        assert_eq!(reported[0].name, "default-cache-ttl");
        assert!(reported[0].flags.contains(OptionFlags::RUNTIME));
        assert_eq!(reported[0].default.as_deref(), Some("600"));
        assert_eq!(reported[1].default, None);
        assert_eq!(reported[2].default.as_deref(), Some("hkps://a.example"));
    }

    #[test]
    fn test_parse_rejects_missing_flags() {
        assert!(matches!(
            parse_capability_output("verbose\n"),
            Err(ProviderError::InvalidOutput(_))
        ));
    }

    #[test]
    fn test_default_ignored_without_default_flag() {
        let reported = parse_capability_output("compliance:0:gnupg\n").unwrap();
        assert_eq!(reported[0].default, None);
    }

    #[test]
    fn test_merge_reported() {
        let schema = vec![
            OptionSpec::new("max-cache-ttl", OptionType::Integer).with_default("7200"),
            OptionSpec::new("verbose", OptionType::Flag),
        ];
        let reported = vec![
            ReportedOption {
                name: "max-cache-ttl".to_string(),
                flags: OptionFlags::DEFAULT | OptionFlags::RUNTIME,
                default: Some("3600".to_string()),
            },
            ReportedOption {
                name: "not-in-catalog".to_string(),
                flags: OptionFlags::empty(),
                default: None,
            },
        ];
        let merged = merge_reported(&schema, &reported);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].default.as_deref(), Some("3600"));
        assert!(merged[0].runtime);
        assert_eq!(merged[1], schema[1]);
    }
}
