//! Typed cell values.
//!
//! [`Value`] is the closed set of things a cell can hold. It serializes to the
//! tagged JSON form the script runtime emits in its project snapshot:
//!
//! ```text
//! {"type": "number", "value": 1.5}
//! {"type": "date", "value": "2024-01-15"}
//! {"type": "empty"}
//! ```

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

const SECONDS_PER_DAY: u32 = 86_400;

/// A single cell value. Dates and times are calendar-naive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ValueRepr", into = "ValueRepr")]
pub enum Value {
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    /// Seconds since midnight.
    Time(u32),
    Empty,
}

impl Value {
    pub fn text(s: impl Into<String>) -> Value {
        Value::Text(s.into())
    }

    /// Build a time-of-day value, wrapping at midnight.
    pub fn time_of_day(hours: u32, minutes: u32, seconds: u32) -> Value {
        Value::Time((hours * 3600 + minutes * 60 + seconds) % SECONDS_PER_DAY)
    }

    /// Parse an ISO calendar date (`YYYY-MM-DD`).
    pub fn parse_date(s: &str) -> Option<Value> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .map(Value::Date)
    }

    /// Parse an ISO time of day (`HH:MM:SS` or `HH:MM`).
    pub fn parse_time(s: &str) -> Option<Value> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .ok()
            .map(|t| Value::Time(t.num_seconds_from_midnight()))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// True for values that fit a float array slot (numbers and empties).
    pub fn is_numeric_or_empty(&self) -> bool {
        matches!(self, Value::Number(_) | Value::Empty)
    }

    /// ISO `HH:MM:SS` rendering of a [`Value::Time`] payload.
    pub fn format_time(seconds: u32) -> String {
        let seconds = seconds % SECONDS_PER_DAY;
        format!(
            "{:02}:{:02}:{:02}",
            seconds / 3600,
            (seconds / 60) % 60,
            seconds % 60
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", Value::format_time(*t)),
            Value::Empty => Ok(()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ValueRepr {
    Number { value: f64 },
    String { value: String },
    Bool { value: bool },
    Date { value: String },
    Time { value: String },
    Empty,
}

impl TryFrom<ValueRepr> for Value {
    type Error = String;

    fn try_from(repr: ValueRepr) -> Result<Self, Self::Error> {
        Ok(match repr {
            ValueRepr::Number { value } => Value::Number(value),
            ValueRepr::String { value } => Value::Text(value),
            ValueRepr::Bool { value } => Value::Boolean(value),
            ValueRepr::Date { value } => {
                Value::parse_date(&value).ok_or_else(|| format!("invalid date: {}", value))?
            }
            ValueRepr::Time { value } => {
                Value::parse_time(&value).ok_or_else(|| format!("invalid time: {}", value))?
            }
            ValueRepr::Empty => Value::Empty,
        })
    }
}

impl From<Value> for ValueRepr {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(value) => ValueRepr::Number { value },
            Value::Text(value) => ValueRepr::String { value },
            Value::Boolean(value) => ValueRepr::Bool { value },
            Value::Date(d) => ValueRepr::Date {
                value: d.format("%Y-%m-%d").to_string(),
            },
            Value::Time(t) => ValueRepr::Time {
                value: Value::format_time(t),
            },
            Value::Empty => ValueRepr::Empty,
        }
    }
}
