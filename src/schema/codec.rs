//! Wire encoding of option values.
//!
//! Listing records and change requests are colon-separated, so field text
//! is percent-escaped. Textual values carry a leading `"` to distinguish an
//! empty string from an absent value.

use std::fmt::Write as _;

use super::{OptionSpec, OptionType, Setting, Value};

/// Percent-escapes the characters that are structural in records.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '%' | ':' | ',' | '\n' | '\r' => {
                let _ = write!(out, "%{:02x}", u32::from(ch));
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Reverses [`escape`]. Malformed `%` sequences are kept literally.
#[must_use]
pub fn unescape(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Some(byte) = hex_pair(bytes[i + 1], bytes[i + 2]) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = char::from(hi).to_digit(16)?;
    let lo = char::from(lo).to_digit(16)?;
    u8::try_from(hi * 16 + lo).ok()
}

/// Renders a list of values for a listing record.
#[must_use]
pub fn encode_values(kind: OptionType, values: &[Value]) -> String {
    values
        .iter()
        .map(|value| match value {
            Value::Set => "1".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Text(s) if kind.is_textual() => format!("\"{}", escape(s)),
            Value::Text(s) => escape(s),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Renders the current value column of a listing record.
#[must_use]
pub fn encode_setting(spec: &OptionSpec, setting: &Setting) -> String {
    encode_values(spec.kind, setting.values())
}

/// Renders the default value column of a listing record.
#[must_use]
pub fn encode_default(spec: &OptionSpec) -> String {
    spec.default_values()
        .map(|values| encode_values(spec.kind, &values))
        .unwrap_or_default()
}

/// Decodes one element of a change-request value: strips the optional
/// `"` prefix of textual types and percent-decodes.
#[must_use]
pub fn decode_element(kind: OptionType, raw: &str) -> String {
    let raw = if kind.is_textual() {
        raw.strip_prefix('"').unwrap_or(raw)
    } else {
        raw
    };
    unescape(raw)
}
