//! Configuration checks and default application.
//!
//! Checking visits every component and collects all problems rather than
//! stopping at the first one. Each component gets its own
//! [`ComponentCheck`]; the aggregate error count in [`CheckReport`] decides
//! the outcome.

use tracing::debug;

use crate::confile::ConfFile;
use crate::error::{Severity, ValidationIssue};
use crate::registry::Component;
use crate::schema::{OptionState, Setting};

// ============================================================================
// Reports
// ============================================================================

/// Outcome of checking one component.
#[derive(Debug, Clone, Default)]
pub struct ComponentCheck {
    /// Registry index.
    pub component: usize,
    /// Component name.
    pub name: String,
    /// Problems that fail the check.
    pub errors: Vec<ValidationIssue>,
    /// Informational findings.
    pub warnings: Vec<ValidationIssue>,
    /// Number of options whose default was written out.
    pub defaults_applied: usize,
    /// The configuration file was rewritten.
    pub written: bool,
}

impl ComponentCheck {
    /// Empty outcome for `component`.
    #[must_use]
    pub fn new(component: &Component) -> Self {
        Self {
            component: component.index,
            name: component.name.clone(),
            ..Self::default()
        }
    }

    /// Outcome for a component that could not be checked at all.
    #[must_use]
    pub fn failed(component: &Component, message: impl Into<String>) -> Self {
        let mut check = Self::new(component);
        check
            .errors
            .push(ValidationIssue::error(&component.name, message));
        check
    }

    /// Files an issue under errors or warnings by severity.
    pub fn push(&mut self, issue: ValidationIssue) {
        match issue.severity {
            Severity::Error => self.errors.push(issue),
            Severity::Warning => self.warnings.push(issue),
        }
    }

    /// Returns `true` if the component passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Aggregate outcome of a best-effort check over all components.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    /// Problems in the global rules file.
    pub rules: Vec<ValidationIssue>,
    /// Per-component outcomes in registry order.
    pub components: Vec<ComponentCheck>,
}

impl CheckReport {
    /// Number of failed items: rejected rule lines plus component errors.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.rules.len() + self.components.iter().map(|c| c.errors.len()).sum::<usize>()
    }

    /// Number of warnings across all components.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.components.iter().map(|c| c.warnings.len()).sum()
    }

    /// Returns `true` if nothing failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error_count() == 0
    }

    /// Every issue in report order: rules first, then per component.
    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.rules.iter().chain(
            self.components
                .iter()
                .flat_map(|c| c.errors.iter().chain(c.warnings.iter())),
        )
    }
}

// ============================================================================
// Checks
// ============================================================================

/// Checks one component's parsed configuration.
///
/// Parse issues are carried over with their severity. Every option marked
/// required must be set explicitly.
#[must_use]
pub fn check_component(
    component: &Component,
    options: &[OptionState],
    file: &ConfFile,
) -> ComponentCheck {
    let mut check = ComponentCheck::new(component);
    for issue in &file.issues {
        check.push(issue.clone());
    }
    for state in options
        .iter()
        .filter(|o| o.spec.required && !o.current.is_explicit())
    {
        check.push(ValidationIssue::error(
            component.config_label(),
            format!("required option '{}' is not set", state.spec.name),
        ));
    }
    debug!(
        component = %component.name,
        errors = check.errors.len(),
        warnings = check.warnings.len(),
        "component checked"
    );
    check
}

/// Writes out defaults of unset force-default options.
///
/// Only options that are neither explicit nor explicitly reverted to the
/// default are touched, so a second pass finds nothing to do. Returns the
/// number of options changed.
pub fn apply_force_defaults(options: &mut [OptionState]) -> usize {
    let mut applied = 0;
    for state in options
        .iter_mut()
        .filter(|o| o.spec.force_default && o.current == Setting::Unset)
    {
        match state.spec.default_values() {
            Some(values) if !values.is_empty() => {
                debug!(option = %state.spec.name, "materializing default");
                state.current = Setting::Explicit(values);
                applied += 1;
            }
            _ => debug!(option = %state.spec.name, "force-default option has no usable default"),
        }
    }
    applied
}
