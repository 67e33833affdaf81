//! Values stored in rows, bound to parameters and compared by conditions.
//!
//! A [`Value`] is dynamically typed. Comparison follows loose semantics:
//! numbers compare numerically across integer, float and boolean, and a
//! numeric string compares equal to the number it spells.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One stored record: column (or document field) name to value.
pub type Row = BTreeMap<String, Value>;

/// Builds a [`Row`] from `name => value` pairs.
///
/// ```
/// use dialectdb::{row, Value};
///
/// let r = row! { "id" => 1, "name" => "ada" };
/// assert_eq!(r.get("name"), Some(&Value::Text("ada".into())));
/// ```
#[macro_export]
macro_rules! row {
    () => {
        $crate::Row::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut row = $crate::Row::new();
        $(row.insert(::std::string::String::from($key), $crate::Value::from($value));)+
        row
    }};
}

/// A dynamically typed value.
///
/// # Examples
///
/// ```
/// use dialectdb::Value;
///
/// assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
/// assert!(Value::Text("2".into()).loose_eq(&Value::Int(2)));
/// assert!(!Value::Null.loose_eq(&Value::Int(0)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Text.
    Text(String),
    /// UTC timestamp.
    Date(DateTime<Utc>),
    /// List, used by `$in`/`$nin`.
    List(Vec<Value>),
    /// Nested JSON.
    Json(serde_json::Value),
}

impl Value {
    /// True for [`Value::Null`].
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The boolean, if this is one.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The text, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// The items, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Date(_) => "date",
            Self::List(_) => "list",
            Self::Json(_) => "json",
        }
    }

    /// Numeric view used by loose comparison.
    ///
    /// Booleans count as 0/1, dates as epoch milliseconds and text only
    /// when it parses as a number.
    #[allow(clippy::cast_precision_loss)]
    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(v) => v.trim().parse::<f64>().ok(),
            Self::Date(v) => Some(v.timestamp_millis() as f64),
            _ => None,
        }
    }

    fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(v) => Some(*v),
            Self::Text(v) => parse_iso_date(v),
            _ => None,
        }
    }

    /// Loose equality.
    ///
    /// `NULL` only equals `NULL`. Text compares to text verbatim; mixed
    /// scalar types compare numerically when both sides have a numeric
    /// reading. Lists compare element-wise.
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Date(_), _) | (_, Self::Date(_)) => match (self.as_date(), other.as_date()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Json(a), other) | (other, Self::Json(a)) => {
                !a.is_object() && Self::from_json(a.clone()).loose_eq(other)
            }
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Ordering used by `<`, `>`, `BETWEEN` and `ORDER BY`.
    ///
    /// Returns `None` when the values are not comparable (either side is
    /// `NULL`, or no common reading exists).
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => None,
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Date(_), _) | (_, Self::Date(_)) => match (self.as_date(), other.as_date()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => None,
            },
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// Total order for sorting: `NULL` first, incomparable values tie.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }

    /// Canonical text form used for index keys and key-value keys.
    #[must_use]
    pub fn key_string(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => format!("{v:.0}"),
            Self::Float(v) => v.to_string(),
            Self::Text(v) => v.clone(),
            Self::Date(v) => v.to_rfc3339(),
            Self::List(_) | Self::Json(_) => self.to_json().to_string(),
        }
    }

    /// Converts a JSON value. Arrays become lists, objects stay JSON.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        use serde_json::Value as J;

        match json {
            J::Null => Self::Null,
            J::Bool(v) => Self::Bool(v),
            J::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            J::String(v) => Self::Text(v),
            J::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            obj @ J::Object(_) => Self::Json(obj),
        }
    }

    /// Converts to JSON. Dates become RFC 3339 strings.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;

        match self {
            Self::Null => J::Null,
            Self::Bool(v) => J::Bool(*v),
            Self::Int(v) => J::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v).map_or(J::Null, J::Number),
            Self::Text(v) => J::String(v.clone()),
            Self::Date(v) => J::String(v.to_rfc3339()),
            Self::List(items) => J::Array(items.iter().map(Self::to_json).collect()),
            Self::Json(v) => v.clone(),
        }
    }
}

/// Parses the ISO-8601 shapes accepted by the SQL value tokenizer:
/// a bare date, a naive date-time, or a date-time with offset.
#[must_use]
pub fn parse_iso_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Date(v) => write!(f, "{}", v.to_rfc3339()),
            Self::List(_) | Self::Json(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Date(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::from_json(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
