//! Minimal XML writer for Query-style response envelopes.
//!
//! Maps JSON values onto elements: object keys become child elements, arrays
//! become repeated item elements, `null` is omitted and scalars become text.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde_json::Value;

/// Default element name for array items.
pub const DEFAULT_MEMBER: &str = "member";

/// Escapes the five XML special characters.
#[must_use]
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Appends `<name>text</name>` with the text escaped.
pub fn write_text_element(out: &mut String, name: &str, text: &str) {
    out.push('<');
    out.push_str(name);
    out.push('>');
    out.push_str(&escape(text));
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Writes the children of a payload value (without a wrapping element).
///
/// `list_members` maps a list field name to its item element name; lists not
/// named there use [`DEFAULT_MEMBER`].
pub fn write_contents(out: &mut String, value: &Value, list_members: &BTreeMap<String, String>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                write_element(out, key, child, list_members);
            }
        }
        Value::Array(items) => {
            for item in items {
                write_element(out, DEFAULT_MEMBER, item, list_members);
            }
        }
        scalar => out.push_str(&escape(&scalar_text(scalar))),
    }
}

fn write_element(
    out: &mut String,
    name: &str,
    value: &Value,
    list_members: &BTreeMap<String, String>,
) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            let member = list_members
                .get(name)
                .map_or(DEFAULT_MEMBER, String::as_str);
            open(out, name);
            for item in items {
                write_element(out, member, item, list_members);
            }
            close(out, name);
        }
        Value::Object(_) => {
            open(out, name);
            write_contents(out, value, list_members);
            close(out, name);
        }
        scalar => write_text_element(out, name, &scalar_text(scalar)),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn open(out: &mut String, name: &str) {
    out.push('<');
    out.push_str(name);
    out.push('>');
}

fn close(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}
