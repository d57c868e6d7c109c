//! CLI argument definitions
//!
//! Commands are selected with mutually exclusive long flags, the way the
//! backend tools' own configuration front ends work; without one the
//! components are listed.

use std::path::{Path, PathBuf};

use clap::{ArgAction, ArgGroup, Parser, ValueEnum};

use crate::observability::LogFormat;
use crate::settings::Settings;

// ============================================================================
// Root CLI
// ============================================================================

/// Inspect and modify the configuration of the installed tool components.
#[derive(Parser, Debug)]
#[command(name = "toolconf", author, version, about)]
#[command(group = ArgGroup::new("command").multiple(false))]
pub struct Cli {
    /// List all components.
    #[arg(long, group = "command")]
    pub list_components: bool,

    /// List the options of COMPONENT.
    #[arg(long, value_name = "COMPONENT", group = "command")]
    pub list_options: Option<String>,

    /// Change the options of COMPONENT, reading requests from stdin.
    #[arg(long, value_name = "COMPONENT", group = "command")]
    pub change_options: Option<String>,

    /// Write the defaults of force-default options for all components.
    #[arg(long, group = "command")]
    pub apply_defaults: bool,

    /// Check the global rules file (or FILE) and every component.
    #[arg(long, value_name = "FILE", num_args = 0..=1, group = "command")]
    pub check_config: Option<Option<PathBuf>>,

    /// Write records to FILE instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Reset verbosity to the default.
    #[arg(long)]
    pub no_verbose: bool,

    /// Suppress all diagnostics.
    #[arg(short, long)]
    pub quiet: bool,

    /// Do not write any file.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Ask running components to reload after a change.
    #[arg(short, long)]
    pub runtime: bool,

    /// Configuration root directory.
    #[arg(long, value_name = "DIR", env = "GNUPGHOME")]
    pub homedir: Option<PathBuf>,

    /// Directory holding component executables.
    #[arg(long, value_name = "DIR", env = "TOOLCONF_BINDIR")]
    pub bindir: Option<PathBuf>,

    /// Alternate component catalog.
    #[arg(long, value_name = "FILE", env = "TOOLCONF_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// System-wide rules file.
    #[arg(long, value_name = "FILE", env = "TOOLCONF_GLOBAL_CONFIG")]
    pub global_config: Option<PathBuf>,

    /// Record format.
    #[arg(long, default_value = "colon")]
    pub format: OutputFormat,

    /// Emit diagnostics as JSON lines.
    #[arg(long)]
    pub log_json: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", env = "TOOLCONF_COLOR")]
    pub color: ColorChoice,
}

/// The operation selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<'a> {
    /// `--list-components`
    ListComponents,
    /// `--list-options COMPONENT`
    ListOptions(&'a str),
    /// `--change-options COMPONENT`
    ChangeOptions(&'a str),
    /// `--apply-defaults`
    ApplyDefaults,
    /// `--check-config [FILE]`
    CheckConfig(Option<&'a Path>),
}

impl Cli {
    /// The selected operation; listing components when none is given.
    #[must_use]
    pub fn action(&self) -> Action<'_> {
        if let Some(name) = &self.list_options {
            Action::ListOptions(name)
        } else if let Some(name) = &self.change_options {
            Action::ChangeOptions(name)
        } else if self.apply_defaults {
            Action::ApplyDefaults
        } else if let Some(file) = &self.check_config {
            Action::CheckConfig(file.as_deref())
        } else {
            Action::ListComponents
        }
    }

    /// Effective verbosity after `--no-verbose`.
    #[must_use]
    pub const fn verbosity(&self) -> u8 {
        if self.no_verbose { 0 } else { self.verbose }
    }

    /// Diagnostic log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        if self.log_json {
            LogFormat::Json
        } else {
            LogFormat::Human
        }
    }

    /// Engine settings for this invocation.
    #[must_use]
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        if let Some(dir) = &self.homedir {
            settings.config_root.clone_from(dir);
        }
        if let Some(dir) = &self.bindir {
            settings.bin_dir.clone_from(dir);
        }
        if let Some(file) = &self.global_config {
            settings.global_config.clone_from(file);
        }
        settings.catalog.clone_from(&self.catalog);
        settings.dry_run = self.dry_run;
        settings.runtime = self.runtime;
        settings
    }
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Colon-separated records, one per line.
    #[default]
    Colon,
    /// JSON.
    Json,
}

// ============================================================================
// Tests
// ============================================================================
