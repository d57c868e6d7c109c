//! Option schema and the in-memory option model.
//!
//! An [`OptionSpec`] describes one setting a component understands. The
//! static part comes from the component catalog; dynamically reported
//! capabilities are merged in by [`provider`]. [`OptionState`] pairs a spec
//! with its tri-state current value.

pub mod codec;
pub mod provider;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChangeError;

pub use provider::{CapabilityProvider, ProcessProvider, ReportedOption, StaticProvider};

// ============================================================================
// Flags
// ============================================================================

bitflags::bitflags! {
    /// Per-option flag bits, printed numerically in option listings.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OptionFlags: u32 {
        /// Option may be given several times; values accumulate.
        const LIST = 1 << 2;
        /// Running instances pick up changes on reload.
        const RUNTIME = 1 << 3;
        /// Option has a default value.
        const DEFAULT = 1 << 4;
        /// Option is locked against changes.
        const NO_CHANGE = 1 << 7;
        /// Directive needs a value.
        const ARG_REQUIRED = 1 << 8;
        /// Option must be set explicitly for the configuration to be valid.
        const REQUIRED = 1 << 9;
        /// `apply-defaults` writes the default when the option is unset.
        const FORCE_DEFAULT = 1 << 10;
    }
}

// ============================================================================
// Level & Type
// ============================================================================

/// Visibility tier of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    /// Shown to everyone.
    #[default]
    Basic,
    /// Shown to experienced users.
    Advanced,
    /// Shown to experts only.
    Expert,
    /// Never shown by front ends.
    Invisible,
}

impl Level {
    /// Numeric code used in option listings.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Basic => 0,
            Self::Advanced => 1,
            Self::Expert => 2,
            Self::Invisible => 3,
        }
    }
}

/// Value type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptionType {
    /// Presence-only switch.
    Flag,
    /// Free text.
    String,
    /// Whole number.
    Integer,
    /// Repeated free-text values.
    #[serde(alias = "list")]
    ListOfString,
    /// `name=expansion` definition.
    Alias,
}

impl OptionType {
    /// Numeric code used in option listings.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Flag => 0,
            Self::String => 1,
            Self::Integer => 2,
            Self::ListOfString => 3,
            Self::Alias => 4,
        }
    }

    /// Returns `true` for types whose values print with a `"` prefix.
    #[must_use]
    pub const fn is_textual(self) -> bool {
        matches!(self, Self::String | Self::ListOfString | Self::Alias)
    }

    const fn expectation(self) -> &'static str {
        match self {
            Self::Flag => "an empty value or a count",
            Self::String | Self::ListOfString => "a single-line string",
            Self::Integer => "a whole number",
            Self::Alias => "NAME=VALUE",
        }
    }
}

// ============================================================================
// Values
// ============================================================================

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Flag is set.
    Set,
    /// Whole number.
    Int(i64),
    /// Text (strings, list elements, alias definitions).
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set => f.write_str("1"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Tri-state current value of an option.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Setting {
    /// Not mentioned anywhere.
    #[default]
    Unset,
    /// Explicitly reverted to the component default.
    Default,
    /// Set in the configuration file. Scalars carry exactly one value.
    Explicit(Vec<Value>),
}

impl Setting {
    /// Values of an explicit setting, empty otherwise.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        match self {
            Self::Explicit(values) => values,
            Self::Unset | Self::Default => &[],
        }
    }

    /// Returns `true` if the option appears in the file.
    #[must_use]
    pub const fn is_explicit(&self) -> bool {
        matches!(self, Self::Explicit(_))
    }
}

// ============================================================================
// OptionSpec
// ============================================================================

/// Static description of one component option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionSpec {
    /// Option name, unique within its component.
    pub name: String,

    /// Value type.
    #[serde(rename = "type")]
    pub kind: OptionType,

    /// Visibility tier.
    #[serde(default)]
    pub level: Level,

    /// One-line description.
    #[serde(default)]
    pub description: String,

    /// Placeholder name of the argument, e.g. `N` or `NAME`.
    #[serde(default)]
    pub arg_name: Option<String>,

    /// Default value in file syntax. List defaults separate elements
    /// with `,`.
    #[serde(default)]
    pub default: Option<String>,

    /// Typed default imposed by a `[default]` rule; wins over `default`.
    #[serde(skip)]
    pub imposed_default: Option<Vec<Value>>,

    /// Running instances honor changes after a reload.
    #[serde(default)]
    pub runtime: bool,

    /// Option is locked against changes.
    #[serde(default)]
    pub no_change: bool,

    /// Option must be set explicitly.
    #[serde(default)]
    pub required: bool,

    /// `apply-defaults` materializes the default when unset.
    #[serde(default)]
    pub force_default: bool,
}

impl OptionSpec {
    /// Creates a spec with the given name and type and no other attributes.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: OptionType) -> Self {
        Self {
            name: name.into(),
            kind,
            level: Level::Basic,
            description: String::new(),
            arg_name: None,
            default: None,
            imposed_default: None,
            runtime: false,
            no_change: false,
            required: false,
            force_default: false,
        }
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Effective flag bits derived from this option.
    #[must_use]
    pub fn flags(&self) -> OptionFlags {
        let mut flags = OptionFlags::empty();
        flags.set(OptionFlags::LIST, self.is_list());
        flags.set(OptionFlags::RUNTIME, self.runtime);
        flags.set(
            OptionFlags::DEFAULT,
            self.default.is_some() || self.imposed_default.is_some(),
        );
        flags.set(OptionFlags::NO_CHANGE, self.no_change);
        flags.set(OptionFlags::ARG_REQUIRED, self.kind != OptionType::Flag);
        flags.set(OptionFlags::REQUIRED, self.required);
        flags.set(OptionFlags::FORCE_DEFAULT, self.force_default);
        flags
    }

    /// Returns `true` if repeated directives accumulate.
    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self.kind, OptionType::ListOfString | OptionType::Alias)
    }

    /// Parses the value text of one configuration-file directive.
    ///
    /// # Errors
    ///
    /// Returns [`ChangeError::TypeMismatch`] when the text does not fit the
    /// option type.
    pub fn parse_directive_value(&self, text: &str) -> Result<Value, ChangeError> {
        match self.kind {
            OptionType::Flag => Ok(Value::Set),
            OptionType::Integer => text
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| self.mismatch(text)),
            OptionType::Alias => match text.split_once('=') {
                Some((name, _)) if !name.trim().is_empty() && !text.contains(['\n', '\r']) => {
                    Ok(Value::Text(text.to_string()))
                }
                _ => Err(self.mismatch(text)),
            },
            OptionType::String | OptionType::ListOfString => {
                if text.is_empty() || text.contains(['\n', '\r']) {
                    Err(self.mismatch(text))
                } else {
                    Ok(Value::Text(text.to_string()))
                }
            }
        }
    }

    /// Parsed default value, if the option declares one that fits its type.
    #[must_use]
    pub fn default_values(&self) -> Option<Vec<Value>> {
        if let Some(values) = &self.imposed_default {
            return Some(values.clone());
        }
        let default = self.default.as_deref()?;
        if self.is_list() {
            default
                .split(',')
                .map(|item| self.parse_directive_value(item.trim()))
                .collect::<Result<Vec<_>, _>>()
                .ok()
        } else {
            self.parse_directive_value(default).ok().map(|v| vec![v])
        }
    }

    pub(crate) fn mismatch(&self, text: &str) -> ChangeError {
        ChangeError::TypeMismatch {
            option: self.name.clone(),
            value: text.to_string(),
            expected: self.kind.expectation(),
        }
    }
}

// ============================================================================
// OptionState
// ============================================================================

/// An option spec together with its parsed and current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionState {
    /// Schema entry.
    pub spec: OptionSpec,
    /// Value as read from disk.
    pub original: Setting,
    /// Value after in-memory changes.
    pub current: Setting,
}

impl OptionState {
    /// Wraps a spec with an unset value.
    #[must_use]
    pub fn new(spec: OptionSpec) -> Self {
        Self {
            spec,
            original: Setting::Unset,
            current: Setting::Unset,
        }
    }

    /// Returns `true` if the file representation must change.
    ///
    /// `Unset` and `Default` both mean "no directive", so switching
    /// between them does not touch the file.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.original.values() != self.current.values()
            || self.original.is_explicit() != self.current.is_explicit()
    }
}
