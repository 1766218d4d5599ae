//! PostgreSQL type mapping to Rust types.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::types::{PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgRow, PgTypeKind, PgValueFormat};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::debug;
use uuid::Uuid;

/// A SQL value that can be serialized to JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Decimal(Decimal),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
    Json(serde_json::Value),
}

impl SqlValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Borrow the value as a string slice if it is textual.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as a boolean.
    ///
    /// Catalog views report flags as `YES`/`NO` text, so those are accepted too.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(b) => Some(*b),
            SqlValue::String(s) => match s.to_ascii_uppercase().as_str() {
                "YES" | "TRUE" | "T" => Some(true),
                "NO" | "FALSE" | "F" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Interpret the value as a float for charting.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::I16(v) => Some(f64::from(*v)),
            SqlValue::I32(v) => Some(f64::from(*v)),
            SqlValue::I64(v) => Some(*v as f64),
            SqlValue::F32(v) => Some(f64::from(*v)),
            SqlValue::F64(v) => Some(*v),
            SqlValue::Decimal(d) => d.to_string().parse().ok(),
            _ => None,
        }
    }

    /// Convert to a display string.
    pub fn to_display_string(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(v) => v.to_string(),
            SqlValue::I16(v) => v.to_string(),
            SqlValue::I32(v) => v.to_string(),
            SqlValue::I64(v) => v.to_string(),
            SqlValue::F32(v) => v.to_string(),
            SqlValue::F64(v) => v.to_string(),
            SqlValue::String(v) => v.clone(),
            SqlValue::Bytes(v) => format!("\\x{}", hex::encode(v)),
            SqlValue::Decimal(v) => v.to_string(),
            SqlValue::Uuid(v) => v.to_string(),
            SqlValue::Date(v) => v.to_string(),
            SqlValue::Time(v) => v.to_string(),
            SqlValue::DateTime(v) => v.to_string(),
            SqlValue::DateTimeUtc(v) => v.to_rfc3339(),
            SqlValue::Json(v) => v.to_string(),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::String(s.to_string())
    }
}

/// Type mapper for converting PostgreSQL types to Rust types.
pub struct TypeMapper;

impl TypeMapper {
    /// Extract a value from a row column, dispatching on the column's type name.
    pub fn extract_column(row: &PgRow, idx: usize) -> SqlValue {
        let Some(col) = row.columns().get(idx) else {
            return SqlValue::Null;
        };

        match col.type_info().name() {
            "BOOL" => get(row, idx, SqlValue::Bool),
            "INT2" => get(row, idx, SqlValue::I16),
            "INT4" => get(row, idx, SqlValue::I32),
            "INT8" => get(row, idx, SqlValue::I64),
            "FLOAT4" => get(row, idx, SqlValue::F32),
            "FLOAT8" => get(row, idx, SqlValue::F64),
            "NUMERIC" => get(row, idx, SqlValue::Decimal),
            "UUID" => get(row, idx, SqlValue::Uuid),
            "DATE" => get(row, idx, SqlValue::Date),
            "TIME" => get(row, idx, SqlValue::Time),
            "TIMESTAMP" => get(row, idx, SqlValue::DateTime),
            "TIMESTAMPTZ" => get(row, idx, SqlValue::DateTimeUtc),
            "BYTEA" => get(row, idx, SqlValue::Bytes),
            "JSON" | "JSONB" => get(row, idx, SqlValue::Json),
            "TEXT" | "VARCHAR" | "NAME" | "BPCHAR" | "CHAR" | "CITEXT" => {
                get(row, idx, SqlValue::String)
            }
            "INTERVAL" => get(row, idx, |v: PgInterval| SqlValue::String(format_interval(&v))),
            "MONEY" => get(row, idx, |v: PgMoney| SqlValue::Decimal(v.to_decimal(2))),
            "TIMETZ" => get(row, idx, |v: PgTimeTz<NaiveTime, FixedOffset>| {
                SqlValue::String(format!("{}{}", v.time, v.offset))
            }),
            "TEXT[]" | "VARCHAR[]" | "NAME[]" => get_array::<Option<String>>(row, idx),
            "BOOL[]" => get_array::<Option<bool>>(row, idx),
            "INT2[]" => get_array::<Option<i16>>(row, idx),
            "INT4[]" => get_array::<Option<i32>>(row, idx),
            "INT8[]" => get_array::<Option<i64>>(row, idx),
            "FLOAT8[]" => get_array::<Option<f64>>(row, idx),
            _ => get_raw(row, idx),
        }
    }

    /// Get the SQL type name for a column.
    pub fn sql_type_name(col: &sqlx::postgres::PgColumn) -> String {
        col.type_info().name().to_string()
    }
}

/// Decode an optional column, falling back to NULL for unsupported types.
fn get<'r, T>(row: &'r PgRow, idx: usize, wrap: fn(T) -> SqlValue) -> SqlValue
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(Some(v)) => wrap(v),
        _ => SqlValue::Null,
    }
}

/// Decode an array column into a JSON array.
fn get_array<T>(row: &PgRow, idx: usize) -> SqlValue
where
    T: Serialize
        + for<'r> sqlx::Decode<'r, sqlx::Postgres>
        + sqlx::Type<sqlx::Postgres>
        + sqlx::postgres::PgHasArrayType,
{
    get(row, idx, |v: Vec<T>| {
        serde_json::to_value(v).map_or(SqlValue::Null, SqlValue::Json)
    })
}

/// Fallback for types without a dedicated arm (enums, domains, inet, ranges).
///
/// Text-format values and enum labels are returned as strings. Any other
/// binary value is returned as raw bytes rather than NULL.
fn get_raw(row: &PgRow, idx: usize) -> SqlValue {
    let value = match row.try_get_raw(idx) {
        Ok(value) => value,
        Err(e) => {
            debug!("Column {} could not be read: {}", idx, e);
            return SqlValue::Null;
        }
    };
    if value.is_null() {
        return SqlValue::Null;
    }

    let type_info = value.type_info();
    let textual = matches!(value.format(), PgValueFormat::Text)
        || matches!(type_info.kind(), PgTypeKind::Enum(_));

    let decoded = if textual {
        value.as_str().map(|v| SqlValue::String(v.to_string()))
    } else {
        value.as_bytes().map(|v| SqlValue::Bytes(v.to_vec()))
    };

    decoded.unwrap_or_else(|e| {
        debug!("Column {} of type {} not decodable: {}", idx, type_info.name(), e);
        SqlValue::Null
    })
}

/// Render an interval the way PostgreSQL prints it by default,
/// e.g. `1 year 2 mons 3 days 04:05:06`.
fn format_interval(interval: &PgInterval) -> String {
    fn unit(n: i64, singular: &str, plural: &str) -> String {
        format!("{} {}", n, if n.abs() == 1 { singular } else { plural })
    }

    let mut parts = Vec::new();
    let years = i64::from(interval.months / 12);
    let months = i64::from(interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year", "years"));
    }
    if months != 0 {
        parts.push(unit(months, "mon", "mons"));
    }
    if interval.days != 0 {
        parts.push(unit(i64::from(interval.days), "day", "days"));
    }

    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let micros = micros.unsigned_abs();
        let secs = micros / 1_000_000;
        let frac = micros % 1_000_000;
        let mut clock = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        if frac != 0 {
            let digits = format!("{:06}", frac);
            clock.push('.');
            clock.push_str(digits.trim_end_matches('0'));
        }
        parts.push(clock);
    }

    parts.join(" ")
}

/// Hex encoding helper (minimal implementation to avoid extra dependency).
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_display() {
        assert_eq!(SqlValue::Null.to_display_string(), "NULL");
        assert_eq!(SqlValue::I32(42).to_display_string(), "42");
        assert_eq!(
            SqlValue::String("hello".to_string()).to_display_string(),
            "hello"
        );
        assert_eq!(SqlValue::Bool(true).to_display_string(), "true");
        assert_eq!(
            SqlValue::Bytes(vec![0xDE, 0xAD]).to_display_string(),
            "\\xdead"
        );
    }

    #[test]
    fn test_catalog_flags() {
        assert_eq!(SqlValue::from("YES").as_bool(), Some(true));
        assert_eq!(SqlValue::from("NO").as_bool(), Some(false));
        assert_eq!(SqlValue::Bool(true).as_bool(), Some(true));
        assert_eq!(SqlValue::from("maybe").as_bool(), None);
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(SqlValue::I64(7).as_f64(), Some(7.0));
        assert_eq!(SqlValue::Decimal(Decimal::new(125, 2)).as_f64(), Some(1.25));
        assert_eq!(SqlValue::from("7").as_f64(), None);
    }

    #[test]
    fn test_interval_rendering() {
        let interval = |months, days, microseconds| PgInterval {
            months,
            days,
            microseconds,
        };

        assert_eq!(format_interval(&interval(0, 0, 0)), "00:00:00");
        assert_eq!(format_interval(&interval(14, 1, 0)), "1 year 2 mons 1 day");
        assert_eq!(
            format_interval(&interval(0, 3, 3_723_500_000)),
            "3 days 01:02:03.5"
        );
        assert_eq!(format_interval(&interval(0, 0, -90_000_000)), "-00:01:30");
    }

    #[test]
    fn test_sql_value_serializes_untagged() {
        let json = serde_json::to_string(&SqlValue::I32(5)).unwrap();
        assert_eq!(json, "5");
        let json = serde_json::to_string(&SqlValue::Null).unwrap();
        assert_eq!(json, "null");
    }
}
