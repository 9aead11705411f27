//! Storage types for columns.

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::fmt;

/// Storage type of a physical column.
#[derive(
    Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// 32-bit signed integer.
    Integer,
    /// 32-bit unsigned integer.
    UnsignedInteger,
    /// 64-bit signed integer.
    BigInteger,
    /// 64-bit unsigned integer.
    UnsignedBigInteger,
    /// Floating point.
    Float,
    /// Fixed-precision decimal.
    Decimal {
        /// Total number of digits.
        precision: u8,
        /// Number of digits after decimal point.
        scale: u8,
    },
    /// Bounded string.
    String,
    /// Unbounded text.
    Text,
    /// Boolean value.
    Boolean,
    /// UUID.
    Uuid,
    /// Timestamp.
    Timestamp,
    /// JSON document.
    Json,
}

impl ColumnType {
    /// Check if this is one of the integer types.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::Integer
                | ColumnType::UnsignedInteger
                | ColumnType::BigInteger
                | ColumnType::UnsignedBigInteger
        )
    }

    /// Check if this is an unsigned integer type.
    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            ColumnType::UnsignedInteger | ColumnType::UnsignedBigInteger
        )
    }

    /// SQL-ish name of the type, as reported by the schema inspector.
    pub fn db_type(&self) -> String {
        match self {
            ColumnType::Integer => "int".to_string(),
            ColumnType::UnsignedInteger => "int unsigned".to_string(),
            ColumnType::BigInteger => "bigint".to_string(),
            ColumnType::UnsignedBigInteger => "bigint unsigned".to_string(),
            ColumnType::Float => "float".to_string(),
            ColumnType::Decimal { precision, scale } => format!("decimal({},{})", precision, scale),
            ColumnType::String => "varchar".to_string(),
            ColumnType::Text => "text".to_string(),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Uuid => "uuid".to_string(),
            ColumnType::Timestamp => "timestamp".to_string(),
            ColumnType::Json => "json".to_string(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.db_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_checks() {
        assert!(ColumnType::Integer.is_integer());
        assert!(ColumnType::UnsignedBigInteger.is_integer());
        assert!(!ColumnType::Uuid.is_integer());

        assert!(ColumnType::UnsignedInteger.is_unsigned());
        assert!(!ColumnType::Integer.is_unsigned());
    }

    #[test]
    fn test_db_type_names() {
        assert_eq!(ColumnType::Integer.db_type(), "int");
        assert_eq!(ColumnType::UnsignedInteger.to_string(), "int unsigned");
        assert_eq!(
            ColumnType::Decimal {
                precision: 10,
                scale: 2
            }
            .db_type(),
            "decimal(10,2)"
        );
    }

    #[test]
    fn test_json_names() {
        let parsed: ColumnType = serde_json::from_str("\"unsigned_integer\"").unwrap();
        assert_eq!(parsed, ColumnType::UnsignedInteger);
    }
}
