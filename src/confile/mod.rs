//! Component configuration files.
//!
//! Files are line oriented: blank lines, `#` comments, and directives of
//! the form `name` or `name value`. Parsing keeps every line's raw text so
//! that rendering an unchanged model reproduces the file byte for byte;
//! only lines of options whose value changed are rewritten.

mod write;

pub use write::write_atomic;

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{ConfigError, ValidationIssue};
use crate::schema::{OptionState, OptionType, Setting, Value};

// ============================================================================
// Types
// ============================================================================

/// Classification of one physical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Blank line or comment, emitted verbatim.
    Passthrough,
    /// Option assignment.
    Directive {
        /// Option name as written.
        name: String,
        /// Trimmed value text, `None` for a bare name.
        value: Option<String>,
        /// Index into the option model; `None` for names outside the schema.
        option: Option<usize>,
        /// The value fit the option type.
        valid: bool,
    },
}

/// One physical line including its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLine {
    /// Raw text exactly as read.
    pub raw: String,
    /// Classification.
    pub kind: LineKind,
}

impl ConfigLine {
    /// Option index for a known directive.
    #[must_use]
    pub const fn option(&self) -> Option<usize> {
        match &self.kind {
            LineKind::Directive { option, .. } => *option,
            LineKind::Passthrough => None,
        }
    }

    /// Returns `true` for any directive, known or not.
    #[must_use]
    pub const fn is_directive(&self) -> bool {
        matches!(self.kind, LineKind::Directive { .. })
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfFile {
    /// Lines in on-disk order.
    pub lines: Vec<ConfigLine>,
    /// Problems found while parsing (unknown names, bad values).
    pub issues: Vec<ValidationIssue>,
    /// The file was present on disk.
    pub existed: bool,
}

// ============================================================================
// Parsing
// ============================================================================

impl ConfFile {
    /// Reads and parses `path`, populating `options` with parsed values.
    ///
    /// A missing file yields an empty model with every option unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file exists but cannot be read
    /// and [`ConfigError::InvalidEncoding`] if it is not UTF-8.
    pub fn load(path: &Path, options: &mut [OptionState]) -> Result<Self, ConfigError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "configuration file does not exist");
                for state in options.iter_mut() {
                    state.original = Setting::Unset;
                    state.current = Setting::Unset;
                }
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let text = String::from_utf8(bytes).map_err(|e| {
            let valid = &e.as_bytes()[..e.utf8_error().valid_up_to()];
            ConfigError::InvalidEncoding {
                path: path.to_path_buf(),
                line: valid.iter().filter(|b| **b == b'\n').count() + 1,
            }
        })?;

        let label = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let mut file = Self::parse(&text, options, &label);
        file.existed = true;
        Ok(file)
    }

    /// Parses `text`, populating `options` with parsed values.
    ///
    /// List options collect every occurrence in order; for scalar options
    /// the last occurrence wins. `label` prefixes issue locations.
    #[must_use]
    pub fn parse(text: &str, options: &mut [OptionState], label: &str) -> Self {
        let mut lines = Vec::new();
        let mut issues = Vec::new();
        let mut values: Vec<Option<Vec<Value>>> = vec![None; options.len()];

        for (idx, raw) in text.split_inclusive('\n').enumerate() {
            let location = format!("{label}:{}", idx + 1);
            let content = raw.trim_end_matches(['\n', '\r']).trim_start();

            if content.is_empty() || content.starts_with('#') {
                lines.push(ConfigLine {
                    raw: raw.to_string(),
                    kind: LineKind::Passthrough,
                });
                continue;
            }

            let (name, rest) = content
                .split_once(char::is_whitespace)
                .map_or((content, ""), |(n, r)| (n, r.trim()));
            let value = (!rest.is_empty()).then(|| rest.to_string());
            let option = options.iter().position(|o| o.spec.name == name);
            let mut valid = true;

            match option {
                None => issues.push(ValidationIssue::warning(
                    &location,
                    format!("unknown option '{name}'"),
                )),
                Some(i) => {
                    let spec = &options[i].spec;
                    let parsed = match (spec.kind, value.as_deref()) {
                        (OptionType::Flag, Some(_)) => {
                            issues.push(ValidationIssue::warning(
                                &location,
                                format!("option '{name}' takes no argument; value ignored"),
                            ));
                            Some(Value::Set)
                        }
                        (OptionType::Flag, None) => Some(Value::Set),
                        (_, None) => {
                            issues.push(ValidationIssue::error(
                                &location,
                                format!("missing argument for option '{name}'"),
                            ));
                            None
                        }
                        (_, Some(text)) => match spec.parse_directive_value(text) {
                            Ok(v) => Some(v),
                            Err(e) => {
                                issues.push(ValidationIssue::error(&location, e.to_string()));
                                None
                            }
                        },
                    };
                    valid = parsed.is_some();
                    if let Some(v) = parsed {
                        let slot = values[i].get_or_insert_with(Vec::new);
                        if !spec.is_list() {
                            slot.clear();
                        }
                        slot.push(v);
                    }
                }
            }

            lines.push(ConfigLine {
                raw: raw.to_string(),
                kind: LineKind::Directive {
                    name: name.to_string(),
                    value,
                    option,
                    valid,
                },
            });
        }

        for (state, parsed) in options.iter_mut().zip(values) {
            let setting = parsed.map_or(Setting::Unset, Setting::Explicit);
            state.original = setting.clone();
            state.current = setting;
        }

        Self {
            lines,
            issues,
            existed: false,
        }
    }

    /// Names of directives outside the schema, in file order.
    #[must_use]
    pub fn unknown_directives(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match &l.kind {
                LineKind::Directive {
                    name, option: None, ..
                } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns `true` if any parse issue has error severity.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == crate::error::Severity::Error)
    }
}

// ============================================================================
// Rendering
// ============================================================================

impl ConfFile {
    /// Renders the file with the current values of `options`.
    ///
    /// Lines of unchanged options and passthrough lines are emitted as
    /// read. A changed option with existing lines is rewritten at its
    /// anchor (first occurrence for lists, last for scalars) and its other
    /// lines dropped; a newly set option is appended after the last
    /// directive; an option reverted to default or unset loses its lines.
    #[must_use]
    pub fn render(&self, options: &[OptionState]) -> String {
        let dirty: Vec<bool> = options.iter().map(OptionState::is_dirty).collect();

        let mut anchors: Vec<Option<usize>> = vec![None; options.len()];
        for (k, line) in self.lines.iter().enumerate() {
            if let Some(i) = line.option() {
                if anchors[i].is_none() || !options[i].spec.is_list() {
                    anchors[i] = Some(k);
                }
            }
        }

        let appended: Vec<usize> = (0..options.len())
            .filter(|&i| dirty[i] && anchors[i].is_none() && options[i].current.is_explicit())
            .collect();
        let insert_after = self.lines.iter().rposition(ConfigLine::is_directive);

        let mut out = String::new();
        for (k, line) in self.lines.iter().enumerate() {
            match line.option() {
                Some(i) if dirty[i] => {
                    if matches!(line.kind, LineKind::Directive { valid: false, .. }) {
                        warn!(
                            option = %options[i].spec.name,
                            line = %line.raw.trim_end(),
                            "dropping malformed directive of changed option"
                        );
                    }
                    if anchors[i] == Some(k) {
                        push_directives(&mut out, &options[i]);
                    }
                }
                _ => out.push_str(&line.raw),
            }
            if insert_after == Some(k) {
                for &i in &appended {
                    push_directives(&mut out, &options[i]);
                }
            }
        }
        if insert_after.is_none() {
            for &i in &appended {
                push_directives(&mut out, &options[i]);
            }
        }
        out
    }
}

fn push_directives(out: &mut String, state: &OptionState) {
    let values = state.current.values();
    if values.is_empty() {
        return;
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    for value in values {
        out.push_str(&state.spec.name);
        if !matches!(value, Value::Set) {
            out.push(' ');
            out.push_str(&value.to_string());
        }
        out.push('\n');
    }
}

// ============================================================================
// Tests
// ============================================================================
