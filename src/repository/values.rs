// ==========================================
// 排课数据同步系统 - 列值编码
// ==========================================
// 职责: 领域值与 SQLite 列值之间的统一格式
// 格式: 日期 %Y-%m-%d，时间 %H:%M:%S，时间戳 %Y-%m-%d %H:%M:%S
// ==========================================

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::Row;
use serde::de::DeserializeOwned;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

pub fn opt_text(value: Option<&str>) -> Value {
    value.map(text).unwrap_or(Value::Null)
}

pub fn int(value: i64) -> Value {
    Value::Integer(value)
}

pub fn opt_int(value: Option<i64>) -> Value {
    value.map(Value::Integer).unwrap_or(Value::Null)
}

pub fn date(value: NaiveDate) -> Value {
    Value::Text(value.format(DATE_FORMAT).to_string())
}

pub fn opt_date(value: Option<NaiveDate>) -> Value {
    value.map(date).unwrap_or(Value::Null)
}

pub fn time(value: NaiveTime) -> Value {
    Value::Text(value.format(TIME_FORMAT).to_string())
}

pub fn datetime(value: NaiveDateTime) -> Value {
    Value::Text(value.format(DATETIME_FORMAT).to_string())
}

pub fn opt_datetime(value: Option<NaiveDateTime>) -> Value {
    value.map(datetime).unwrap_or(Value::Null)
}

pub fn utc(value: DateTime<Utc>) -> Value {
    Value::Text(value.to_rfc3339())
}

// ===== 行读取 =====

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub fn read_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub fn read_opt_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub fn read_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveTime> {
    let raw: String = row.get(idx)?;
    NaiveTime::parse_from_str(&raw, TIME_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub fn read_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub fn read_opt_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

pub fn read_utc(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

/// 读取 JSON 文本列
pub fn read_opt_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}
