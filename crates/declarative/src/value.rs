//! Attribute values
//!
//! Values arrive already resolved by the caller. The only conversion done
//! here is lenient coercion: numeric strings for integer attributes and
//! "true"/"false" strings for booleans.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A resolved attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

/// Attribute name -> value
pub type Attributes = BTreeMap<String, Value>;

/// Shape an attribute accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Int,
    Str,
    List,
    Map,
    /// Octal string ("0644") or integer
    Mode,
    /// Shell string or argv list
    Command,
}

impl ValueType {
    /// Name used in error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "boolean",
            Self::Int => "integer",
            Self::Str => "string",
            Self::List => "list of strings",
            Self::Map => "map of strings",
            Self::Mode => "octal mode",
            Self::Command => "command string or argv list",
        }
    }

    /// Whether `value` can be read as this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Bool => value.as_bool().is_some(),
            Self::Int => value.as_int().is_some(),
            Self::Str => value.as_str().is_some(),
            Self::List => value.as_list().is_some(),
            Self::Map => value.as_map().is_some(),
            Self::Mode => value.as_mode().is_some(),
            Self::Command => matches!(value, Value::Str(s) if !s.trim().is_empty())
                || matches!(value, Value::List(l) if !l.is_empty()),
        }
    }
}

impl Value {
    /// Boolean, accepting "true"/"false" strings
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Str(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Self::Str(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// Integer, accepting numeric strings
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String slice; numbers are not stringified
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// List of strings; a single string is a one-element list
    pub fn as_list(&self) -> Option<Vec<String>> {
        match self {
            Self::List(l) => Some(l.clone()),
            Self::Str(s) => Some(vec![s.clone()]),
            _ => None,
        }
    }

    /// Map of strings
    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Permission bits from an octal string or an integer
    ///
    /// Integers are taken as already-decoded bits (`0o644` = 420).
    pub fn as_mode(&self) -> Option<u32> {
        let mode = match self {
            Self::Int(i) => u32::try_from(*i).ok()?,
            Self::Str(s) => {
                let s = s.trim();
                let digits = s.strip_prefix("0o").unwrap_or(s);
                u32::from_str_radix(digits, 8).ok()?
            }
            _ => return None,
        };
        (mode <= 0o7777).then_some(mode)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => f.write_str(s),
            Self::List(l) => write!(f, "[{}]", l.join(", ")),
            Self::Map(m) => {
                let pairs: Vec<String> = m.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(l: Vec<String>) -> Self {
        Self::List(l)
    }
}

impl From<Vec<&str>> for Value {
    fn from(l: Vec<&str>) -> Self {
        Self::List(l.into_iter().map(str::to_string).collect())
    }
}

impl From<BTreeMap<String, String>> for Value {
    fn from(m: BTreeMap<String, String>) -> Self {
        Self::Map(m)
    }
}

/// Build an [`Attributes`] map from `name => value` pairs
///
/// ```
/// use declarative::attrs;
/// let a = attrs! { "content" => "hello", "backup" => true };
/// assert_eq!(a.len(), 2);
/// ```
#[macro_export]
macro_rules! attrs {
    () => { $crate::value::Attributes::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::value::Attributes::new();
        $( map.insert(($key).to_string(), $crate::value::Value::from($value)); )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_bool() {
        assert_eq!(Value::from("TRUE").as_bool(), Some(true));
        assert_eq!(Value::from("false").as_bool(), Some(false));
        assert_eq!(Value::from("yes").as_bool(), None);
        assert_eq!(Value::Int(1).as_bool(), None);
    }

    #[test]
    fn test_lenient_int() {
        assert_eq!(Value::from(" 30 ").as_int(), Some(30));
        assert_eq!(Value::Int(-1).as_int(), Some(-1));
        assert_eq!(Value::from("thirty").as_int(), None);
    }

    #[test]
    fn test_mode() {
        assert_eq!(Value::from("0644").as_mode(), Some(0o644));
        assert_eq!(Value::from("755").as_mode(), Some(0o755));
        assert_eq!(Value::from("0o600").as_mode(), Some(0o600));
        assert_eq!(Value::Int(0o640).as_mode(), Some(0o640));
        assert_eq!(Value::from("0999").as_mode(), None);
        assert_eq!(Value::Int(0o17777).as_mode(), None);
    }

    #[test]
    fn test_command_type() {
        assert!(ValueType::Command.accepts(&Value::from("ls -l")));
        assert!(ValueType::Command.accepts(&Value::List(vec!["ls".into()])));
        assert!(!ValueType::Command.accepts(&Value::from("  ")));
        assert!(!ValueType::Command.accepts(&Value::List(Vec::new())));
    }

    #[test]
    fn test_string_is_one_element_list() {
        assert_eq!(Value::from("HDP").as_list(), Some(vec!["HDP".to_string()]));
    }

    #[test]
    fn test_untagged_json() {
        let v: Value = serde_json::from_str(r#"{"a": "1"}"#).unwrap();
        assert!(v.as_map().is_some());
        let v: Value = serde_json::from_str("[\"x\", \"y\"]").unwrap();
        assert_eq!(v.as_list().map(|l| l.len()), Some(2));
    }

    #[test]
    fn test_attrs_macro() {
        let a = attrs! { "mode" => "0644", "tries" => 3_i64 };
        assert_eq!(a.get("tries"), Some(&Value::Int(3)));
    }
}
