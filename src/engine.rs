//! Configuration engine
//!
//! The engine ties the registry, the capability provider, the file
//! parser, the change protocol, and the rules file together behind the
//! operations the command line exposes. It never prints and never exits;
//! every operation returns records or reports for the caller to render.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::change::{ChangeReport, apply_changes};
use crate::confile::{ConfFile, write_atomic};
use crate::error::{ConfigError, Result, ToolconfError, ValidationIssue};
use crate::notify::notify_reload;
use crate::registry::{Component, Registry};
use crate::rules::RulesFile;
use crate::schema::codec::{encode_default, encode_setting, escape};
use crate::schema::provider::merge_reported;
use crate::schema::{CapabilityProvider, OptionState, ProcessProvider};
use crate::settings::Settings;
use crate::validate::{CheckReport, ComponentCheck, apply_force_defaults, check_component};

// ============================================================================
// Types
// ============================================================================

/// Components an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A single component by registry index.
    One(usize),
    /// Every registered component.
    All,
}

/// Option model of one component together with its parsed file.
#[derive(Debug, Clone)]
pub struct ComponentOptions {
    /// Registry index.
    pub component: usize,
    /// Options in schema order.
    pub options: Vec<OptionState>,
    /// Parsed configuration file.
    pub file: ConfFile,
}

/// A component that could not be loaded in all-components mode.
#[derive(Debug)]
pub struct ComponentFailure {
    /// Registry index.
    pub component: usize,
    /// What went wrong.
    pub error: ToolconfError,
}

/// Result of retrieving options for a [`Target`].
#[derive(Debug, Default)]
pub struct Retrieval {
    /// Successfully loaded components in registry order.
    pub loaded: Vec<ComponentOptions>,
    /// Components skipped because of an error.
    pub failures: Vec<ComponentFailure>,
}

/// One line of the component listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentRecord {
    /// Registry index.
    pub index: usize,
    /// Component name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Executable is present.
    pub installed: bool,
}

impl fmt::Display for ComponentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.index, self.name, escape(&self.description))
    }
}

/// One line of an option listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionRecord {
    /// Option name.
    pub name: String,
    /// Flag bits.
    pub flags: u32,
    /// Level code.
    pub level: u8,
    /// Description.
    pub description: String,
    /// Type code.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Argument placeholder.
    pub arg_name: String,
    /// Encoded default value, empty when there is none.
    pub default_value: String,
    /// Encoded current value, empty unless set in the file.
    pub current_value: String,
}

impl OptionRecord {
    fn from_state(state: &OptionState) -> Self {
        let spec = &state.spec;
        Self {
            name: spec.name.clone(),
            flags: spec.flags().bits(),
            level: spec.level.code(),
            description: spec.description.clone(),
            kind: spec.kind.code(),
            arg_name: spec.arg_name.clone().unwrap_or_default(),
            default_value: encode_default(spec),
            current_value: encode_setting(spec, &state.current),
        }
    }
}

impl fmt::Display for OptionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}:{}:{}",
            self.name,
            self.flags,
            self.level,
            escape(&self.description),
            self.kind,
            escape(&self.arg_name),
            self.default_value,
            self.current_value
        )
    }
}

/// Result of a change batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeOutcome {
    /// Per-line results.
    pub report: ChangeReport,
    /// The configuration file was rewritten.
    pub written: bool,
}

// ============================================================================
// Engine
// ============================================================================

/// Entry point for all configuration operations.
pub struct Engine {
    registry: Registry,
    settings: Settings,
    provider: Box<dyn CapabilityProvider>,
    rules: RulesFile,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("components", &self.registry.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine over `registry` using `provider` for capability
    /// queries.
    ///
    /// The default rules file is read here. An unreadable file is recorded
    /// as a rule error; operations that honor the rules refuse to run
    /// while any rule error is present.
    #[must_use]
    pub fn new(
        registry: Registry,
        settings: Settings,
        provider: Box<dyn CapabilityProvider>,
    ) -> Self {
        let rules = RulesFile::load(&settings.global_config, false, &registry).unwrap_or_else(|e| {
            RulesFile {
                rules: Vec::new(),
                issues: vec![ValidationIssue::error(
                    settings.global_config.display().to_string(),
                    e.to_string(),
                )],
            }
        });
        debug!(rules = rules.rules.len(), errors = rules.issues.len(), "global rules loaded");
        Self {
            registry,
            settings,
            provider,
            rules,
        }
    }

    /// Creates an engine with the catalog from `settings` that queries
    /// component executables.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let registry = Registry::load(&settings)?;
        let provider = ProcessProvider::new(settings.query_timeout)
            .with_config_root(settings.config_root.clone());
        Ok(Self::new(registry, settings, Box::new(provider)))
    }

    /// The component registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The settings this engine runs with.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolves a component name to its index.
    ///
    /// # Errors
    ///
    /// Returns [`ToolconfError::NotFound`] for unknown names.
    pub fn find(&self, name: &str) -> Result<usize> {
        self.registry.find(name)
    }

    /// Fails when the default rules file has errors, logging each one.
    fn ensure_rules_valid(&self) -> Result<()> {
        if !self.rules.has_errors() {
            return Ok(());
        }
        for issue in &self.rules.issues {
            error!(%issue, "invalid global rule");
        }
        Err(ConfigError::Rules {
            path: self.settings.global_config.clone(),
            count: self.rules.issues.len(),
        }
        .into())
    }

    fn component(&self, index: usize) -> Result<&Component> {
        self.registry.get(index).ok_or_else(|| ToolconfError::NotFound {
            name: index.to_string(),
            suggestion: None,
        })
    }

    // ========================================================================
    // Retrieval
    // ========================================================================

    /// Builds the option model for `target`.
    ///
    /// For a single component any failure is returned as the error. In
    /// all-components mode failures are recorded and the remaining
    /// components are still loaded; components that must be queried but
    /// are not installed are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only for a single-component target.
    pub async fn retrieve_options(&self, target: Target) -> Result<Retrieval> {
        self.retrieve_with(target, &self.rules, false).await
    }

    async fn retrieve_with(
        &self,
        target: Target,
        rules: &RulesFile,
        defaults: bool,
    ) -> Result<Retrieval> {
        let mut retrieval = Retrieval::default();
        match target {
            Target::One(index) => {
                let loaded = self.load_component(index, rules, defaults).await?;
                retrieval.loaded.push(loaded);
            }
            Target::All => {
                for component in self.registry.list() {
                    if component.probe && !component.installed {
                        debug!(component = %component.name, "skipping component that is not installed");
                        continue;
                    }
                    match self.load_component(component.index, rules, defaults).await {
                        Ok(loaded) => retrieval.loaded.push(loaded),
                        Err(error) => {
                            warn!(component = %component.name, %error, "component skipped");
                            retrieval.failures.push(ComponentFailure {
                                component: component.index,
                                error,
                            });
                        }
                    }
                }
            }
        }
        Ok(retrieval)
    }

    async fn load_component(
        &self,
        index: usize,
        rules: &RulesFile,
        defaults: bool,
    ) -> Result<ComponentOptions> {
        let component = self.component(index)?;
        let schema = if component.probe {
            let reported = self.provider.query(component).await.map_err(|source| {
                ToolconfError::ComponentUnavailable {
                    component: component.name.clone(),
                    source,
                }
            })?;
            merge_reported(&component.schema, &reported)
        } else {
            component.schema.clone()
        };

        let mut options: Vec<OptionState> = schema.into_iter().map(OptionState::new).collect();
        rules.apply(index, &mut options, self.settings.user.as_deref(), defaults);
        let file = ConfFile::load(&component.config_file, &mut options)?;
        debug!(
            component = %component.name,
            options = options.len(),
            lines = file.lines.len(),
            "component options loaded"
        );
        Ok(ComponentOptions {
            component: index,
            options,
            file,
        })
    }

    // ========================================================================
    // Listing
    // ========================================================================

    /// Lists every registered component in registry order.
    #[must_use]
    pub fn list_components(&self) -> Vec<ComponentRecord> {
        self.registry
            .list()
            .iter()
            .map(|c| ComponentRecord {
                index: c.index,
                name: c.name.clone(),
                description: c.description.clone(),
                installed: c.installed,
            })
            .collect()
    }

    /// Lists the options of one component in schema order.
    ///
    /// # Errors
    ///
    /// Returns an error if the global rules file has errors, or the
    /// component cannot be queried or its configuration file cannot be
    /// read.
    pub async fn list_options(&self, index: usize) -> Result<Vec<OptionRecord>> {
        self.ensure_rules_valid()?;
        let loaded = self.load_component(index, &self.rules, false).await?;
        for issue in &loaded.file.issues {
            warn!(%issue, "configuration problem");
        }
        Ok(loaded.options.iter().map(OptionRecord::from_state).collect())
    }

    // ========================================================================
    // Changes
    // ========================================================================

    /// Applies change request lines to one component.
    ///
    /// Every accepted line takes effect even when others fail. The file is
    /// rewritten if anything changed, unless this is a dry run; after a
    /// write the running component is asked to reload when runtime mode
    /// is on.
    ///
    /// # Errors
    ///
    /// Returns an error if the global rules file has errors, the component
    /// cannot be loaded, or the file cannot be written. Rejected lines are
    /// reported in the outcome.
    pub async fn change_options<'a>(
        &self,
        index: usize,
        lines: impl IntoIterator<Item = &'a str>,
    ) -> Result<ChangeOutcome> {
        self.ensure_rules_valid()?;
        let component = self.component(index)?;
        let mut loaded = self.load_component(index, &self.rules, false).await?;
        for issue in &loaded.file.issues {
            warn!(%issue, "configuration problem");
        }

        let report = apply_changes(&mut loaded.options, component.list_delimiter, lines);
        for failure in &report.failures {
            debug!(component = %component.name, %failure, "change rejected");
        }

        let written = self.persist(component, &loaded)?;
        if written && self.settings.runtime {
            notify_reload(component, &self.settings).await;
        }
        Ok(ChangeOutcome { report, written })
    }

    /// Writes the rendered file if any option changed. Returns whether the
    /// file was rewritten.
    fn persist(&self, component: &Component, loaded: &ComponentOptions) -> Result<bool> {
        if !loaded.options.iter().any(OptionState::is_dirty) {
            debug!(component = %component.name, "nothing to write");
            return Ok(false);
        }
        let content = loaded.file.render(&loaded.options);
        if self.settings.dry_run {
            info!(component = %component.name, path = %component.config_file.display(), "dry run, not writing");
            return Ok(false);
        }
        write_atomic(&component.config_file, &content)?;
        info!(component = %component.name, path = %component.config_file.display(), "configuration updated");
        Ok(true)
    }

    // ========================================================================
    // Checking
    // ========================================================================

    /// Checks every component's configuration.
    ///
    /// `rules_file` names a rules file to check instead of the default
    /// one; it must exist.
    ///
    /// # Errors
    ///
    /// Returns an error only if the rules file cannot be read. Problems
    /// with components are collected in the report.
    pub async fn check_config(&self, rules_file: Option<&Path>) -> Result<CheckReport> {
        self.run_checks(rules_file, false).await
    }

    /// Writes the default of every unset force-default option in every
    /// component, checking each component on the way. Nothing is written
    /// while the global rules file has errors; the report carries them.
    ///
    /// # Errors
    ///
    /// Returns an error only if the rules file cannot be read.
    pub async fn apply_defaults(&self) -> Result<CheckReport> {
        self.run_checks(None, true).await
    }

    async fn run_checks(&self, rules_file: Option<&Path>, apply: bool) -> Result<CheckReport> {
        let rules = match rules_file {
            Some(path) => RulesFile::load(path, true, &self.registry)?,
            None => RulesFile::load(&self.settings.global_config, false, &self.registry)?,
        };
        let mut report = CheckReport {
            rules: rules.issues.clone(),
            components: Vec::new(),
        };
        let apply = if apply && rules.has_errors() {
            warn!(errors = rules.issues.len(), "global rules have errors, defaults not applied");
            false
        } else {
            apply
        };

        let retrieval = self.retrieve_with(Target::All, &rules, apply).await?;
        let mut failures = retrieval.failures.into_iter().peekable();
        for mut loaded in retrieval.loaded {
            while let Some(failure) = failures.next_if(|f| f.component < loaded.component) {
                report.components.push(self.failed_check(&failure));
            }
            let component = self.component(loaded.component)?;
            let defaults_applied = if apply {
                apply_force_defaults(&mut loaded.options)
            } else {
                0
            };
            let mut check = check_component(component, &loaded.options, &loaded.file);
            check.defaults_applied = defaults_applied;

            if apply {
                match self.persist(component, &loaded) {
                    Ok(written) => check.written = written,
                    Err(e) => check
                        .errors
                        .push(ValidationIssue::error(&component.name, e.to_string())),
                }
                if check.written && self.settings.runtime {
                    notify_reload(component, &self.settings).await;
                }
            }
            report.components.push(check);
        }
        for failure in failures {
            report.components.push(self.failed_check(&failure));
        }

        info!(
            errors = report.error_count(),
            warnings = report.warning_count(),
            "configuration check finished"
        );
        Ok(report)
    }

    fn failed_check(&self, failure: &ComponentFailure) -> ComponentCheck {
        match self.registry.get(failure.component) {
            Some(component) => ComponentCheck::failed(component, failure.error.to_string()),
            None => ComponentCheck::default(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
