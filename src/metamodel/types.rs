//! Value types carried by basic attributes, parameters and result columns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The Java-side value type of a basic column.
///
/// Only used for parameter type inference and result descriptors; the
/// translator never converts values itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    String,
    Integer,
    Long,
    Decimal,
    Double,
    Boolean,
    Date,
    Timestamp,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueType::Integer | ValueType::Long | ValueType::Decimal | ValueType::Double
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Long => "long",
            ValueType::Decimal => "decimal",
            ValueType::Double => "double",
            ValueType::Boolean => "boolean",
            ValueType::Date => "date",
            ValueType::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "text" => Ok(ValueType::String),
            "integer" | "int" => Ok(ValueType::Integer),
            "long" | "bigint" => Ok(ValueType::Long),
            "decimal" | "numeric" => Ok(ValueType::Decimal),
            "double" | "float" => Ok(ValueType::Double),
            "boolean" | "bool" => Ok(ValueType::Boolean),
            "date" => Ok(ValueType::Date),
            "timestamp" => Ok(ValueType::Timestamp),
            other => Err(format!("unknown value type: {}", other)),
        }
    }
}
