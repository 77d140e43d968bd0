//! Values moved across the facades.

use super::DataAccessError;

/// A named-variable value as the simulations expose it.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl DataValue {
    /// Kind name used in [`DataAccessError::TypeMismatch`].
    pub fn kind(&self) -> &'static str {
        match self {
            DataValue::Bool(_) => "bool",
            DataValue::Number(_) => "number",
            DataValue::Text(_) => "text",
        }
    }
}

impl From<bool> for DataValue {
    fn from(v: bool) -> Self {
        DataValue::Bool(v)
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        DataValue::Number(v)
    }
}

impl From<u32> for DataValue {
    fn from(v: u32) -> Self {
        DataValue::Number(f64::from(v))
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        DataValue::Text(v.to_string())
    }
}

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        DataValue::Text(v)
    }
}

/// Conversion out of a [`DataValue`] for the typed accessor.
pub trait FromDataValue: Sized {
    /// Convert `value`, read from variable `name`, into `Self`.
    fn from_data_value(name: &str, value: DataValue) -> Result<Self, DataAccessError>;
}

fn mismatch(name: &str, expected: &'static str, value: &DataValue) -> DataAccessError {
    DataAccessError::TypeMismatch {
        name: name.to_string(),
        expected,
        found: value.kind(),
    }
}

impl FromDataValue for bool {
    fn from_data_value(name: &str, value: DataValue) -> Result<Self, DataAccessError> {
        match value {
            DataValue::Bool(b) => Ok(b),
            // Simulator flags are frequently published as 0/1 numbers.
            DataValue::Number(n) if n == 0.0 || n == 1.0 => Ok(n == 1.0),
            other => Err(mismatch(name, "bool", &other)),
        }
    }
}

impl FromDataValue for f64 {
    fn from_data_value(name: &str, value: DataValue) -> Result<Self, DataAccessError> {
        match value {
            DataValue::Number(n) => Ok(n),
            other => Err(mismatch(name, "number", &other)),
        }
    }
}

impl FromDataValue for u32 {
    fn from_data_value(name: &str, value: DataValue) -> Result<Self, DataAccessError> {
        match value {
            DataValue::Number(n) if n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) => {
                Ok(n as u32)
            }
            other => Err(mismatch(name, "unsigned integer", &other)),
        }
    }
}

impl FromDataValue for String {
    fn from_data_value(name: &str, value: DataValue) -> Result<Self, DataAccessError> {
        match value {
            DataValue::Text(s) => Ok(s),
            other => Err(mismatch(name, "text", &other)),
        }
    }
}
