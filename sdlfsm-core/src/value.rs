//! Dynamically typed scalar values.
//!
//! A [`Value`] carries one authoritative representation selected by its
//! [`DataType`] and keeps the remaining representations as coerced copies:
//!
//! | active   | bool        | int          | double      | string |
//! |----------|-------------|--------------|-------------|--------|
//! | `bool`   | -           | `0` / `1`    | `0.0`/`1.0` | empty  |
//! | `int`    | `i != 0`    | -            | `i as f64`  | empty  |
//! | `double` | `d != 0.0`  | `d as i64`   | -           | empty  |
//! | `string` | `false`     | `0`          | `NaN`       | -      |
//!
//! The copies are refreshed by [`Value::harmonize`] after every mutation.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Undef,
    Bool,
    Int,
    Double,
    String,
}

impl DataType {
    /// Parses a type name, long (`INT`) or short (`I`) form, case-insensitive.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNDEF" | "U" => Ok(DataType::Undef),
            "BOOL" | "B" => Ok(DataType::Bool),
            "INT" | "I" => Ok(DataType::Int),
            "DOUBLE" | "F" => Ok(DataType::Double),
            "STRING" | "S" => Ok(DataType::String),
            _ => Err(CoreError::InvalidValue {
                reason: format!("unknown data type '{}'", s),
            }),
        }
    }

    /// Returns the canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Undef => "UNDEF",
            DataType::Bool => "BOOL",
            DataType::Int => "INT",
            DataType::Double => "DOUBLE",
            DataType::String => "STRING",
        }
    }

    /// Returns the one-letter tag used when rendering values.
    pub fn short_name(&self) -> char {
        match self {
            DataType::Undef => 'u',
            DataType::Bool => 'b',
            DataType::Int => 'i',
            DataType::Double => 'd',
            DataType::String => 's',
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged scalar with mutually consistent representations.
#[derive(Debug, Clone)]
pub struct Value {
    data_type: DataType,
    b: bool,
    i: i64,
    d: f64,
    s: String,
}

impl Default for Value {
    fn default() -> Self {
        Self::undef()
    }
}

impl Value {
    /// Creates an undefined value.
    pub fn undef() -> Self {
        Self {
            data_type: DataType::Undef,
            b: false,
            i: 0,
            d: 0.0,
            s: String::new(),
        }
    }

    /// Creates the zero value of the given type.
    pub fn with_type(data_type: DataType) -> Self {
        let mut value = Self::undef();
        value.data_type = data_type;
        if data_type == DataType::String {
            value.harmonize();
        }
        value
    }

    pub fn bool(b: bool) -> Self {
        let mut value = Self::with_type(DataType::Bool);
        value.b = b;
        value.harmonize();
        value
    }

    pub fn int(i: i64) -> Self {
        let mut value = Self::with_type(DataType::Int);
        value.i = i;
        value.harmonize();
        value
    }

    pub fn double(d: f64) -> Self {
        let mut value = Self::with_type(DataType::Double);
        value.d = d;
        value.harmonize();
        value
    }

    pub fn string(s: impl Into<String>) -> Self {
        let mut value = Self::with_type(DataType::String);
        value.s = s.into();
        value.harmonize();
        value
    }

    /// Parses a raw string into a value of the given type.
    pub fn parse(data_type: DataType, raw: &str) -> Result<Self, CoreError> {
        let invalid = || CoreError::InvalidValue {
            reason: format!("cannot parse '{}' as {}", raw, data_type),
        };
        let trimmed = raw.trim();
        match data_type {
            DataType::Undef => Ok(Self::undef()),
            DataType::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Self::bool(true)),
                "false" | "0" => Ok(Self::bool(false)),
                _ => Err(invalid()),
            },
            DataType::Int => trimmed.parse().map(Self::int).map_err(|_| invalid()),
            DataType::Double => trimmed.parse().map(Self::double).map_err(|_| invalid()),
            DataType::String => Ok(Self::string(raw)),
        }
    }

    /// Converts a JSON scalar into a value. `null` maps to an undefined value.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, CoreError> {
        match json {
            serde_json::Value::Null => Ok(Self::undef()),
            serde_json::Value::Bool(b) => Ok(Self::bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::int(i)),
                None => n.as_f64().map(Self::double).ok_or_else(|| CoreError::InvalidValue {
                    reason: format!("number out of range: {}", n),
                }),
            },
            serde_json::Value::String(s) => Ok(Self::string(s.clone())),
            other => Err(CoreError::InvalidValue {
                reason: format!("expected a scalar, got {}", other),
            }),
        }
    }

    /// Converts the active representation into a JSON scalar.
    pub fn to_json(&self) -> serde_json::Value {
        match self.data_type {
            DataType::Undef => serde_json::Value::Null,
            DataType::Bool => serde_json::Value::Bool(self.b),
            DataType::Int => serde_json::Value::from(self.i),
            DataType::Double => serde_json::Number::from_f64(self.d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            DataType::String => serde_json::Value::String(self.s.clone()),
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_undef(&self) -> bool {
        self.data_type == DataType::Undef
    }

    /// Boolean view of the value.
    pub fn as_bool(&self) -> bool {
        self.b
    }

    /// Integer view of the value.
    pub fn as_int(&self) -> i64 {
        self.i
    }

    /// Floating point view of the value.
    pub fn as_double(&self) -> f64 {
        self.d
    }

    /// String view of the value. Empty unless the value is a string.
    pub fn as_str(&self) -> &str {
        &self.s
    }

    /// Refreshes the non-active representations from the active one.
    pub fn harmonize(&mut self) {
        match self.data_type {
            DataType::Undef => {}
            DataType::Bool => {
                self.i = i64::from(self.b);
                self.d = if self.b { 1.0 } else { 0.0 };
                self.s.clear();
            }
            DataType::Int => {
                self.b = self.i != 0;
                self.d = self.i as f64;
                self.s.clear();
            }
            DataType::Double => {
                self.b = self.d != 0.0;
                self.i = self.d as i64;
                self.s.clear();
            }
            DataType::String => {
                self.b = false;
                self.i = 0;
                self.d = f64::NAN;
            }
        }
    }

    /// Copies the representation selected by this value's type out of `rhs`.
    ///
    /// An undefined destination takes everything from `rhs`, including its
    /// type. Otherwise the destination keeps its type and only reads the
    /// matching (already coerced) field of `rhs`.
    pub fn assign(&mut self, rhs: &Value) {
        match self.data_type {
            DataType::Undef => {
                self.data_type = rhs.data_type;
                self.b = rhs.b;
                self.i = rhs.i;
                self.d = rhs.d;
                self.s.clone_from(&rhs.s);
            }
            DataType::Bool => self.b = rhs.b,
            DataType::Int => self.i = rhs.i,
            DataType::Double => self.d = rhs.d,
            DataType::String => self.s.clone_from(&rhs.s),
        }
        self.harmonize();
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.data_type != other.data_type {
            return false;
        }
        match self.data_type {
            DataType::Undef => true,
            DataType::Bool => self.b == other.b,
            DataType::Int => self.i == other.i,
            DataType::Double => self.d == other.d,
            DataType::String => self.s == other.s,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.data_type.short_name();
        match self.data_type {
            DataType::Undef => write!(f, "{} ?", tag),
            DataType::Bool => write!(f, "{} {}", tag, u8::from(self.b)),
            DataType::Int => write!(f, "{} {}", tag, self.i),
            DataType::Double => write!(f, "{} {}", tag, self.d),
            DataType::String => write!(f, "{} '{}'", tag, self.s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::string(s)
    }
}
