//! Decoding of Postgres rows into JSON objects.
//!
//! Column values are mapped by their Postgres type name. Types without a
//! dedicated mapping are read as text when the driver allows it.

use adapters::ResultMap;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Number, Value};
use sqlx::postgres::PgRow;
use sqlx::types::BigDecimal;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::DbError;

/// Convert one row into a column-name → value map.
pub fn row_to_map(row: &PgRow) -> Result<ResultMap, DbError> {
    let mut map = ResultMap::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.name(), column.type_info().name())?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

fn decode_column(row: &PgRow, idx: usize, column: &str, type_name: &str) -> Result<Value, DbError> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOL" => Value::from(row.try_get::<bool, _>(idx)?),
        "INT2" => Value::from(row.try_get::<i16, _>(idx)?),
        "INT4" => Value::from(row.try_get::<i32, _>(idx)?),
        "INT8" => Value::from(row.try_get::<i64, _>(idx)?),
        "FLOAT4" => float_value(f64::from(row.try_get::<f32, _>(idx)?)),
        "FLOAT8" => float_value(row.try_get::<f64, _>(idx)?),
        "NUMERIC" => numeric_value(&row.try_get::<BigDecimal, _>(idx)?),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx)?,
        "UUID" => Value::String(row.try_get::<uuid::Uuid, _>(idx)?.to_string()),
        "TIMESTAMPTZ" => Value::String(row.try_get::<DateTime<Utc>, _>(idx)?.to_rfc3339()),
        "TIMESTAMP" => Value::String(
            row.try_get::<NaiveDateTime, _>(idx)?
                .format("%Y-%m-%dT%H:%M:%S%.f")
                .to_string(),
        ),
        "DATE" => Value::String(row.try_get::<NaiveDate, _>(idx)?.to_string()),
        "TIME" => Value::String(row.try_get::<NaiveTime, _>(idx)?.to_string()),
        _ => row
            .try_get::<String, _>(idx)
            .map(Value::String)
            .map_err(|_| DbError::Decode {
                column: column.to_string(),
                type_name: type_name.to_string(),
            })?,
    };

    Ok(value)
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Integers stay integers, other finite values become floats, and anything
/// that does not fit either is kept as its exact decimal text.
pub fn numeric_value(d: &BigDecimal) -> Value {
    let text = d.to_string();
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    match text.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) if n.to_string() == text => Value::Number(n),
        _ => Value::String(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn decimal(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn integral_numeric_becomes_integer() {
        assert_eq!(numeric_value(&decimal("42")), Value::from(42));
    }

    #[test]
    fn short_fraction_becomes_float() {
        assert_eq!(numeric_value(&decimal("12.5")), Value::from(12.5));
    }

    #[test]
    fn high_precision_numeric_keeps_its_text() {
        let text = "12345678901234567890.123456789";
        assert_eq!(numeric_value(&decimal(text)), Value::String(text.to_string()));
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert_eq!(float_value(f64::NAN), Value::Null);
    }
}
