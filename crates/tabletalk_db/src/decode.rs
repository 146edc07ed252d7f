//! Backend row -> `DbValue` conversion.
//!
//! Result sets from generated queries have no static shape, so each cell is
//! decoded by trying the backend's native types in turn. A cell whose type is
//! not understood is rendered as a placeholder rather than failing the query.

use sqlx::{Column, Row, TypeInfo};

use crate::pool::DbRow;
use crate::types::DbValue;

/// Column names of a row, in result order.
pub(crate) fn column_names(row: &DbRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

/// Decode every cell of a row.
pub(crate) fn decode_row(row: &DbRow) -> Vec<DbValue> {
    (0..row.len()).map(|index| decode_value(row, index)).collect()
}

fn unsupported(row: &DbRow, index: usize) -> DbValue {
    DbValue::Text(format!("<{}>", row.column(index).type_info().name()))
}

#[cfg(feature = "sqlite")]
fn decode_value(row: &DbRow, index: usize) -> DbValue {
    // SQLite checks against the runtime storage class of the value.
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.into();
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.into();
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.into();
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v.into();
    }
    unsupported(row, index)
}

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
fn decode_value(row: &DbRow, index: usize) -> DbValue {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use sqlx::types::Decimal;

    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.into();
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(index) {
        return v.map(i64::from).into();
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return v.map(i64::from).into();
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.into();
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(index) {
        return v.map(f64::from).into();
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.into();
    }
    if let Ok(v) = row.try_get::<Option<Decimal>, _>(index) {
        // NUMERIC keeps its exact text form (e.g. "8421.50")
        return v.map(|d| d.to_string()).into();
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.into();
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(index) {
        return v.map(|t| t.to_rfc3339()).into();
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(index) {
        return v.map(|t| t.to_string()).into();
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(index) {
        return v.map(|t| t.to_string()).into();
    }
    if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(index) {
        return v.map(|t| t.to_string()).into();
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v.into();
    }
    unsupported(row, index)
}
