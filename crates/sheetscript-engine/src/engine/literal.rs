//! Script literal encoding.
//!
//! Everything produced here is later re-parsed as program source, so text
//! literals escape backslash, the single quote and every control byte.
//! Encoding is total: there is no failure path.

use std::fmt::Write;

use super::geometry::{LabelBands, Rect};
use super::value::Value;
use crate::helpers::{DATE_CTOR, RECT_CTOR, TIME_CTOR};

/// Structured records that render as constructor calls.
#[derive(Clone, Copy, Debug)]
pub enum Structured<'a> {
    Rect(&'a Rect),
    LabelCounts(&'a LabelBands),
}

/// Render a value as a script literal.
pub fn encode(value: &Value) -> String {
    match value {
        Value::Text(s) => encode_str(s),
        Value::Number(n) => encode_number(*n),
        Value::Boolean(true) => "True".to_string(),
        Value::Boolean(false) => "False".to_string(),
        Value::Date(d) => format!("{}('{}')", DATE_CTOR, d.format("%Y-%m-%d")),
        Value::Time(t) => format!("{}('{}')", TIME_CTOR, Value::format_time(*t)),
        Value::Empty => "None".to_string(),
    }
}

/// Integral numbers render without a fractional part.
pub fn encode_number(n: f64) -> String {
    if n.is_nan() {
        return "float('nan')".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 {
            "float('inf')".to_string()
        } else {
            "-float('inf')".to_string()
        };
    }
    if n == 0.0 {
        // Avoid `-0`.
        return "0".to_string();
    }
    // f64 Display is the shortest round-trip form and omits `.0` for integers.
    n.to_string()
}

/// Single-quoted text literal.
pub fn encode_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

pub fn encode_list(values: &[Value]) -> String {
    let items: Vec<String> = values.iter().map(encode).collect();
    format!("[{}]", items.join(", "))
}

pub fn encode_str_list<S: AsRef<str>>(items: &[S]) -> String {
    let items: Vec<String> = items.iter().map(|s| encode_str(s.as_ref())).collect();
    format!("[{}]", items.join(", "))
}

pub fn encode_2d(rows: &[Vec<Value>]) -> String {
    let items: Vec<String> = rows.iter().map(|row| encode_list(row)).collect();
    format!("[{}]", items.join(", "))
}

/// Dict literal with keys in sorted order, independent of input order.
pub fn encode_dict<'a, K, I>(entries: I) -> String
where
    K: AsRef<str> + 'a,
    I: IntoIterator<Item = (K, &'a Value)>,
{
    let mut pairs: Vec<(K, &Value)> = entries.into_iter().collect();
    pairs.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));
    let items: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{}: {}", encode_str(k.as_ref()), encode(v)))
        .collect();
    format!("{{{}}}", items.join(", "))
}

pub fn encode_structured(record: Structured<'_>) -> String {
    match record {
        Structured::Rect(r) => format!(
            "{}({}, {}, {}, {})",
            RECT_CTOR,
            encode_number(r.x),
            encode_number(r.y),
            encode_number(r.width),
            encode_number(r.height)
        ),
        Structured::LabelCounts(b) => format!(
            "dict(top={}, left={}, bottom={}, right={})",
            b.top, b.left, b.bottom, b.right
        ),
    }
}
