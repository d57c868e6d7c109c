//! Change protocol
//!
//! Change requests arrive one per line as `name:flags:value`. Each line is
//! checked and applied on its own: a bad line is reported and the batch
//! carries on, so every valid change in the batch still takes effect.

use std::str::FromStr;

use tracing::debug;

use crate::error::ChangeError;
use crate::registry::suggest;
use crate::schema::codec::decode_element;
use crate::schema::{OptionSpec, OptionState, OptionType, Setting, Value};

/// Numeric flag selecting the component default.
pub const FLAG_USE_DEFAULT: u32 = 16;

/// Numeric flag leaving the option untouched.
pub const FLAG_NO_CHANGE: u32 = 128;

// ============================================================================
// Types
// ============================================================================

/// What a change request does with its option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeMode {
    /// Leave the current value as is.
    NoChange,
    /// Revert to the component default.
    UseDefault,
    /// Set the supplied value.
    Explicit,
}

impl FromStr for ChangeMode {
    type Err = ChangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "explicit" => Ok(Self::Explicit),
            "use-default" | "default" => Ok(Self::UseDefault),
            "no-change" => Ok(Self::NoChange),
            other => match other.parse::<u32>() {
                Ok(0) => Ok(Self::Explicit),
                Ok(FLAG_USE_DEFAULT) => Ok(Self::UseDefault),
                Ok(FLAG_NO_CHANGE) => Ok(Self::NoChange),
                _ => Err(ChangeError::InvalidFlags(other.to_string())),
            },
        }
    }
}

/// One parsed change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest {
    /// Target option name.
    pub option: String,
    /// Requested mode.
    pub mode: ChangeMode,
    /// Raw value field; `None` when the line has no third field.
    pub value: Option<String>,
}

impl FromStr for ChangeRequest {
    type Err = ChangeError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.splitn(3, ':');
        let option = fields.next().unwrap_or_default().trim();
        let Some(flags) = fields.next() else {
            return Err(ChangeError::Malformed(line.to_string()));
        };
        if option.is_empty() {
            return Err(ChangeError::Malformed(line.to_string()));
        }
        Ok(Self {
            option: option.to_string(),
            mode: flags.parse()?,
            value: fields.next().map(str::to_string),
        })
    }
}

/// A change request line that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFailure {
    /// 1-based input line number.
    pub line: usize,
    /// Reason.
    pub error: ChangeError,
}

impl std::fmt::Display for LineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)
    }
}

/// Outcome of a change batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    /// Number of accepted requests.
    pub applied: usize,
    /// Rejected lines.
    pub failures: Vec<LineFailure>,
}

impl ChangeReport {
    /// Returns `true` if every request was accepted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// Application
// ============================================================================

/// Applies a batch of change request lines to `options`.
///
/// Blank lines are skipped. `delimiter` separates list elements.
pub fn apply_changes<'a>(
    options: &mut [OptionState],
    delimiter: char,
    lines: impl IntoIterator<Item = &'a str>,
) -> ChangeReport {
    let mut report = ChangeReport::default();
    for (idx, line) in lines.into_iter().enumerate() {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }
        let outcome = line
            .parse::<ChangeRequest>()
            .and_then(|req| apply_request(options, delimiter, &req));
        match outcome {
            Ok(()) => report.applied += 1,
            Err(error) => report.failures.push(LineFailure {
                line: idx + 1,
                error,
            }),
        }
    }
    report
}

/// Applies one request.
///
/// # Errors
///
/// Returns a [`ChangeError`] if the option is unknown or locked, or the
/// value does not fit the option type.
pub fn apply_request(
    options: &mut [OptionState],
    delimiter: char,
    req: &ChangeRequest,
) -> Result<(), ChangeError> {
    let Some(pos) = options.iter().position(|o| o.spec.name == req.option) else {
        return Err(ChangeError::UnknownOption {
            name: req.option.clone(),
            suggestion: suggest(&req.option, options.iter().map(|o| o.spec.name.as_str())),
        });
    };
    let state = &mut options[pos];

    if req.mode != ChangeMode::NoChange && state.spec.no_change {
        return Err(ChangeError::NoChangeAllowed(req.option.clone()));
    }

    match req.mode {
        ChangeMode::NoChange => {}
        ChangeMode::UseDefault => {
            if req.value.as_deref().is_some_and(|v| !v.is_empty()) {
                return Err(ChangeError::ValueWithDefault(req.option.clone()));
            }
            state.current = Setting::Default;
        }
        ChangeMode::Explicit => {
            state.current = typed_setting(&state.spec, delimiter, req.value.as_deref())?;
        }
    }
    debug!(option = %req.option, mode = ?req.mode, "change accepted");
    Ok(())
}

/// Type-checks a change value and converts it into a setting.
///
/// # Errors
///
/// Returns [`ChangeError::TypeMismatch`] for values that do not fit.
pub fn typed_setting(
    spec: &OptionSpec,
    delimiter: char,
    value: Option<&str>,
) -> Result<Setting, ChangeError> {
    match (spec.kind, value) {
        (OptionType::Flag, None) => Ok(Setting::Unset),
        (OptionType::Flag, Some("")) => Ok(Setting::Explicit(vec![Value::Set])),
        (OptionType::Flag, Some(count)) => match count.parse::<u32>() {
            Ok(0) => Ok(Setting::Unset),
            Ok(_) => Ok(Setting::Explicit(vec![Value::Set])),
            Err(_) => Err(spec.mismatch(count)),
        },
        (_, None | Some("")) => Ok(Setting::Unset),
        (kind, Some(raw)) => {
            let elements: Vec<&str> = if spec.is_list() {
                raw.split(delimiter).collect()
            } else {
                vec![raw]
            };
            let values = elements
                .into_iter()
                .map(|element| spec.parse_directive_value(decode_element(kind, element).trim()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Setting::Explicit(values))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<OptionState> {
        let mut locked = OptionSpec::new("min-passphrase-len", OptionType::Integer);
        locked.no_change = true;
        vec![
            OptionState::new(OptionSpec::new("verbose", OptionType::Flag)),
            OptionState::new(OptionSpec::new("keyserver", OptionType::String)),
            OptionState::new(OptionSpec::new("group", OptionType::ListOfString)),
            OptionState::new(OptionSpec::new("max-cache-ttl", OptionType::Integer)),
            OptionState::new(locked),
        ]
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn parse_symbolic_and_numeric_flags() {
        assert_eq!("".parse::<ChangeMode>(), Ok(ChangeMode::Explicit));
        assert_eq!("0".parse::<ChangeMode>(), Ok(ChangeMode::Explicit));
        assert_eq!("16".parse::<ChangeMode>(), Ok(ChangeMode::UseDefault));
        assert_eq!("use-default".parse::<ChangeMode>(), Ok(ChangeMode::UseDefault));
        assert_eq!("128".parse::<ChangeMode>(), Ok(ChangeMode::NoChange));
        assert!("144".parse::<ChangeMode>().is_err());
        assert!("bogus".parse::<ChangeMode>().is_err());
    }

    #[test]
    fn parse_request_fields() {
        let req: ChangeRequest = "group:explicit:admin,readers".parse().unwrap();
        assert_eq!(req.option, "group");
        assert_eq!(req.mode, ChangeMode::Explicit);
        assert_eq!(req.value.as_deref(), Some("admin,readers"));

        let req: ChangeRequest = "verbose:0".parse().unwrap();
        assert_eq!(req.value, None);

        let req: ChangeRequest = "keyserver::hkps://a:443".parse().unwrap();
        assert_eq!(req.value.as_deref(), Some("hkps://a:443"));
    }

    #[test]
    fn malformed_lines_rejected() {
        assert!(matches!(
            "verbose".parse::<ChangeRequest>(),
            Err(ChangeError::Malformed(_))
        ));
        assert!(matches!(
            ":0:".parse::<ChangeRequest>(),
            Err(ChangeError::Malformed(_))
        ));
    }

    #[test]
    fn use_default_clears_value() {
        let mut opts = options();
        opts[0].current = Setting::Explicit(vec![Value::Set]);
        let report = apply_changes(&mut opts, ',', ["verbose:use-default:"]);
        assert!(report.is_success());
        assert_eq!(opts[0].current, Setting::Default);
    }

    #[test]
    fn use_default_with_value_rejected() {
        let mut opts = options();
        let report = apply_changes(&mut opts, ',', ["max-cache-ttl:16:20"]);
        assert_eq!(
            report.failures[0].error,
            ChangeError::ValueWithDefault("max-cache-ttl".to_string())
        );
    }

    #[test]
    fn flag_values() {
        let spec = OptionSpec::new("verbose", OptionType::Flag);
        assert_eq!(typed_setting(&spec, ',', None), Ok(Setting::Unset));
        assert_eq!(
            typed_setting(&spec, ',', Some("")),
            Ok(Setting::Explicit(vec![Value::Set]))
        );
        assert_eq!(
            typed_setting(&spec, ',', Some("2")),
            Ok(Setting::Explicit(vec![Value::Set]))
        );
        assert_eq!(typed_setting(&spec, ',', Some("0")), Ok(Setting::Unset));
        assert!(typed_setting(&spec, ',', Some("yes")).is_err());
    }

    #[test]
    fn list_split_on_delimiter() {
        let mut opts = options();
        let report = apply_changes(&mut opts, ',', ["group:explicit:admin,\"readers"]);
        assert!(report.is_success());
        assert_eq!(
            opts[2].current,
            Setting::Explicit(vec![text("admin"), text("readers")])
        );
    }

    #[test]
    fn custom_delimiter() {
        let mut opts = options();
        apply_changes(&mut opts, ';', ["group:0:a,b;c"]);
        assert_eq!(opts[2].current, Setting::Explicit(vec![text("a,b"), text("c")]));
    }

    #[test]
    fn string_is_percent_decoded() {
        let mut opts = options();
        apply_changes(&mut opts, ',', ["keyserver:0:\"hkps%3a//keys.example"]);
        assert_eq!(
            opts[1].current,
            Setting::Explicit(vec![text("hkps://keys.example")])
        );
    }

    #[test]
    fn partial_batch_keeps_good_lines() {
        let mut opts = options();
        let report = apply_changes(
            &mut opts,
            ',',
            [
                "verbose:0:",
                "nosuch:0:1",
                "",
                "max-cache-ttl:0:abc",
                "max-cache-ttl:0:300",
            ],
        );
        assert_eq!(report.applied, 2);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].line, 2);
        assert_eq!(report.failures[1].line, 4);
        assert!(matches!(
            report.failures[1].error,
            ChangeError::TypeMismatch { .. }
        ));
        assert_eq!(opts[0].current, Setting::Explicit(vec![Value::Set]));
        assert_eq!(opts[3].current, Setting::Explicit(vec![Value::Int(300)]));
    }

    #[test]
    fn unknown_option_suggests() {
        let mut opts = options();
        let report = apply_changes(&mut opts, ',', ["verbos:0:"]);
        assert_eq!(
            report.failures[0].error,
            ChangeError::UnknownOption {
                name: "verbos".to_string(),
                suggestion: Some("verbose".to_string()),
            }
        );
    }

    #[test]
    fn locked_option_rejected_but_no_change_allowed() {
        let mut opts = options();
        let report = apply_changes(
            &mut opts,
            ',',
            ["min-passphrase-len:0:12", "min-passphrase-len:no-change:"],
        );
        assert_eq!(report.applied, 1);
        assert_eq!(
            report.failures[0].error,
            ChangeError::NoChangeAllowed("min-passphrase-len".to_string())
        );
        assert_eq!(opts[4].current, Setting::Unset);
    }

    #[test]
    fn encoded_newline_in_alias_rejected() {
        let mut opts = options();
        opts.push(OptionState::new(OptionSpec::new("alias", OptionType::Alias)));
        let report = apply_changes(&mut opts, ',', ["alias:0:\"team=alice%0averbose"]);
        assert_eq!(report.applied, 0);
        assert!(matches!(
            report.failures[0].error,
            ChangeError::TypeMismatch { .. }
        ));
        assert_eq!(opts[5].current, Setting::Unset);
    }

    #[test]
    fn empty_string_value_unsets() {
        let mut opts = options();
        opts[1].current = Setting::Explicit(vec![text("x")]);
        apply_changes(&mut opts, ',', ["keyserver:0:"]);
        assert_eq!(opts[1].current, Setting::Unset);
    }
}
