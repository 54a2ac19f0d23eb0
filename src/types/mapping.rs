//! Resolution of engine-declared SQL type names to driver value types.

use serde::{Deserialize, Serialize};

/// Concrete value type a column resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueType {
    /// BOOLEAN
    Boolean,
    /// Integral numbers (TINYINT through BIGINT)
    Integer,
    /// Approximate and exact decimals
    Float,
    /// Character data
    String,
    /// Binary data
    Binary,
    /// Calendar date, carried as ISO-8601 text
    Date,
    /// Time of day, carried as ISO-8601 text
    Time,
    /// Date and time without zone, carried as ISO-8601 text
    Timestamp,
}

/// Column nullability as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Nullability {
    /// Column never holds NULL
    NonNull,
    /// Column may hold NULL
    Nullable,
    /// Engine did not say
    Unknown,
}

impl Nullability {
    /// Native code for "no nulls".
    pub const NO_NULLS: i32 = 0;
    /// Native code for "nullable".
    pub const NULLABLE: i32 = 1;
    /// Native code for "nullability unknown".
    pub const NULLABLE_UNKNOWN: i32 = 2;

    /// Decode a native nullability code. Unrecognised codes are unknown.
    pub fn from_code(code: i32) -> Self {
        match code {
            Self::NO_NULLS => Nullability::NonNull,
            Self::NULLABLE => Nullability::Nullable,
            _ => Nullability::Unknown,
        }
    }

    /// Encode as a native nullability code.
    pub fn code(&self) -> i32 {
        match self {
            Nullability::NonNull => Self::NO_NULLS,
            Nullability::Nullable => Self::NULLABLE,
            Nullability::Unknown => Self::NULLABLE_UNKNOWN,
        }
    }
}

/// Type mapper for engine type names.
pub struct TypeMapper;

impl TypeMapper {
    /// Resolve a declared SQL type name to a value type.
    ///
    /// Accepts plain SQL names (`VARCHAR`, `VARCHAR(20)`, `BIGINT`, ...) as well as
    /// the fully-qualified JVM class names some engines report for field types.
    /// Unknown names resolve to `None`.
    pub fn resolve(type_name: &str) -> Option<ValueType> {
        let base = type_name
            .split('(')
            .next()
            .unwrap_or(type_name)
            .trim()
            .to_ascii_uppercase();

        match base.as_str() {
            "BOOLEAN" | "BOOL" | "BIT" | "JAVA.LANG.BOOLEAN" => Some(ValueType::Boolean),

            "TINYINT" | "SMALLINT" | "INT" | "INTEGER" | "BIGINT" | "JAVA.LANG.BYTE"
            | "JAVA.LANG.SHORT" | "JAVA.LANG.INTEGER" | "JAVA.LANG.LONG" => {
                Some(ValueType::Integer)
            }

            "REAL" | "FLOAT" | "DOUBLE" | "DOUBLE PRECISION" | "DECIMAL" | "NUMERIC"
            | "JAVA.LANG.FLOAT" | "JAVA.LANG.DOUBLE" | "JAVA.MATH.BIGDECIMAL" => {
                Some(ValueType::Float)
            }

            "CHAR" | "VARCHAR" | "VARCHAR_IGNORECASE" | "CHARACTER VARYING" | "TEXT" | "CLOB"
            | "UUID" | "JAVA.LANG.STRING" | "JAVA.UTIL.UUID" => Some(ValueType::String),

            "BINARY" | "VARBINARY" | "BLOB" | "[B" => Some(ValueType::Binary),

            "DATE" | "JAVA.SQL.DATE" | "JAVA.TIME.LOCALDATE" => Some(ValueType::Date),
            "TIME" | "JAVA.SQL.TIME" | "JAVA.TIME.LOCALTIME" => Some(ValueType::Time),
            "TIMESTAMP" | "DATETIME" | "JAVA.SQL.TIMESTAMP" | "JAVA.TIME.LOCALDATETIME"
            | "JAVA.UTIL.DATE" => Some(ValueType::Timestamp),

            _ => None,
        }
    }
}
