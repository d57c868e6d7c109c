//! System-wide rules file
//!
//! Administrators can lock options or impose defaults for every user with
//! a rules file (`gpgconf.conf`). Each rule line reads
//!
//! ```text
//! <user-pattern> <component> <option> [<flag>] [<value>]
//! ```
//!
//! A line starting with whitespace reuses the previous user pattern. The
//! pattern `*` matches every user, a plain name matches that login name,
//! and group patterns (`:group`) are recognized but never match. Flags are
//! `[change]` (the default), `[no-change]`, and `[default]`; the value uses
//! change-protocol encoding.

use std::path::Path;

use tracing::debug;

use crate::change::typed_setting;
use crate::error::{ConfigError, ValidationIssue};
use crate::registry::Registry;
use crate::schema::{OptionState, Setting, Value};

/// Per-rule flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleFlag {
    /// Users may change the option.
    #[default]
    Change,
    /// Users may not change the option.
    NoChange,
    /// `apply-defaults` writes the rule value when the option is unset.
    Default,
}

/// One rule line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// 1-based line number.
    pub line: usize,
    /// User pattern.
    pub user: String,
    /// Registry index of the component.
    pub component: usize,
    /// Option name.
    pub option: String,
    /// Rule flag.
    pub flag: RuleFlag,
    /// Typed values, if the rule carries any.
    pub value: Option<Vec<Value>>,
}

impl Rule {
    /// Returns `true` if the rule applies to `user`.
    #[must_use]
    pub fn matches_user(&self, user: Option<&str>) -> bool {
        match self.user.as_str() {
            "*" => true,
            group if group.starts_with(':') => {
                debug!(pattern = group, "group patterns are not matched");
                false
            }
            name => user == Some(name),
        }
    }
}

/// Parsed rules file.
#[derive(Debug, Clone, Default)]
pub struct RulesFile {
    /// Valid rules in file order.
    pub rules: Vec<Rule>,
    /// Problems found, one per rejected line.
    pub issues: Vec<ValidationIssue>,
}

impl RulesFile {
    /// Reads and parses the rules file at `path`.
    ///
    /// A missing file yields an empty rule set unless `explicit` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] for a missing explicit file and
    /// [`ConfigError::Read`] for unreadable files.
    pub fn load(path: &Path, explicit: bool, registry: &Registry) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let label = path.display().to_string();
                Ok(Self::parse(&text, registry, &label))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                debug!(path = %path.display(), "no global rules file");
                Ok(Self::default())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::MissingFile {
                path: path.to_path_buf(),
            }),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parses rule text against the registry's static schemas.
    #[must_use]
    pub fn parse(text: &str, registry: &Registry, label: &str) -> Self {
        let mut file = Self::default();
        let mut current_user: Option<String> = None;

        for (idx, line) in text.lines().enumerate() {
            let lineno = idx + 1;
            let location = format!("{label}:{lineno}");
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut fields = trimmed.split_whitespace();
            if !line.starts_with(char::is_whitespace) {
                current_user = fields.next().map(str::to_string);
            }
            let Some(user) = current_user.clone() else {
                file.issues.push(ValidationIssue::error(
                    &location,
                    "continuation line without a preceding user pattern",
                ));
                continue;
            };

            let Some(component_name) = fields.next() else {
                // Bare user pattern; following indented lines inherit it.
                continue;
            };
            match parse_rule_tail(component_name, fields, registry) {
                Ok((component, option, flag, value)) => file.rules.push(Rule {
                    line: lineno,
                    user,
                    component,
                    option,
                    flag,
                    value,
                }),
                Err(message) => file.issues.push(ValidationIssue::error(&location, message)),
            }
        }
        file
    }

    /// Returns `true` if any line was rejected.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Applies the rules for `component` that match `user` to `options`.
    ///
    /// `[no-change]` always locks the option. `[default]` rules mark the
    /// option force-default (and replace its default value) only when
    /// `defaults` is set.
    pub fn apply(
        &self,
        component: usize,
        options: &mut [OptionState],
        user: Option<&str>,
        defaults: bool,
    ) {
        for rule in self
            .rules
            .iter()
            .filter(|r| r.component == component && r.matches_user(user))
        {
            let Some(state) = options.iter_mut().find(|o| o.spec.name == rule.option) else {
                continue;
            };
            match rule.flag {
                RuleFlag::Change => {}
                RuleFlag::NoChange => state.spec.no_change = true,
                RuleFlag::Default if defaults => {
                    state.spec.force_default = true;
                    if let Some(values) = &rule.value {
                        state.spec.imposed_default = Some(values.clone());
                    }
                }
                RuleFlag::Default => {}
            }
            debug!(option = %rule.option, flag = ?rule.flag, line = rule.line, "applied global rule");
        }
    }
}

fn parse_rule_tail<'a>(
    component_name: &str,
    mut fields: impl Iterator<Item = &'a str>,
    registry: &Registry,
) -> Result<(usize, String, RuleFlag, Option<Vec<Value>>), String> {
    let component = registry
        .find(component_name)
        .map_err(|_| format!("unknown component '{component_name}'"))?;
    let component = &registry.list()[component];

    let option = fields
        .next()
        .ok_or_else(|| format!("missing option name for component '{component_name}'"))?;
    let spec = component
        .option(option)
        .ok_or_else(|| format!("unknown option '{option}' for component '{component_name}'"))?;

    let rest: Vec<&str> = fields.collect();
    let (flag, value_fields) = match rest.first() {
        Some(f) if f.starts_with('[') => {
            let flag = match *f {
                "[change]" => RuleFlag::Change,
                "[no-change]" => RuleFlag::NoChange,
                "[default]" => RuleFlag::Default,
                other => return Err(format!("unknown flag '{other}'")),
            };
            (flag, &rest[1..])
        }
        _ => (RuleFlag::Change, &rest[..]),
    };

    let value = if value_fields.is_empty() {
        None
    } else {
        let raw = value_fields.join(" ");
        match typed_setting(spec, component.list_delimiter, Some(raw.as_str())) {
            Ok(Setting::Explicit(values)) => Some(values),
            Ok(_) => None,
            Err(e) => return Err(e.to_string()),
        }
    };

    Ok((component.index, option.to_string(), flag, value))
}
