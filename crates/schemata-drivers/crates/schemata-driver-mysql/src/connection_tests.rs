//! Tests for MySQL value conversion

use crate::connection::{mysql_value_to_value, value_to_mysql};
use mysql_async::Value as My;
use mysql_async::consts::ColumnType;
use pretty_assertions::assert_eq;
use schemata_core::Value;

fn text(column_type: ColumnType, raw: &str) -> Value {
    mysql_value_to_value(My::Bytes(raw.as_bytes().to_vec()), column_type, false)
}

#[test]
fn test_text_protocol_numbers_parse_by_column_type() {
    assert_eq!(text(ColumnType::MYSQL_TYPE_LONG, "42"), Value::Int64(42));
    assert_eq!(text(ColumnType::MYSQL_TYPE_LONGLONG, "-7"), Value::Int64(-7));
    assert_eq!(
        text(ColumnType::MYSQL_TYPE_LONGLONG, "18446744073709551615"),
        Value::Decimal("18446744073709551615".into())
    );
    assert_eq!(text(ColumnType::MYSQL_TYPE_DOUBLE, "2.5"), Value::Float64(2.5));
    assert_eq!(
        text(ColumnType::MYSQL_TYPE_NEWDECIMAL, "10.50"),
        Value::Decimal("10.50".into())
    );
}

#[test]
fn test_text_protocol_temporals_and_json() {
    assert_eq!(
        text(ColumnType::MYSQL_TYPE_DATE, "2024-02-29"),
        Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
    );
    assert_eq!(
        text(ColumnType::MYSQL_TYPE_DATETIME, "2024-02-29 10:15:00"),
        Value::DateTime(
            chrono::NaiveDate::from_ymd_opt(2024, 2, 29)
                .unwrap()
                .and_hms_opt(10, 15, 0)
                .unwrap()
        )
    );
    assert_eq!(
        text(ColumnType::MYSQL_TYPE_DATE, "0000-00-00"),
        Value::String("0000-00-00".into())
    );
    assert_eq!(
        text(ColumnType::MYSQL_TYPE_JSON, "{\"a\":1}"),
        Value::Json(serde_json::json!({"a": 1}))
    );
    assert_eq!(
        text(ColumnType::MYSQL_TYPE_VAR_STRING, "hello"),
        Value::String("hello".into())
    );
}

#[test]
fn test_binary_columns_stay_bytes() {
    assert_eq!(
        mysql_value_to_value(My::Bytes(b"abc".to_vec()), ColumnType::MYSQL_TYPE_BLOB, true),
        Value::Bytes(b"abc".to_vec())
    );
    assert_eq!(
        mysql_value_to_value(My::Bytes(vec![0xff, 0xfe]), ColumnType::MYSQL_TYPE_BLOB, false),
        Value::Bytes(vec![0xff, 0xfe])
    );
}

#[test]
fn test_binary_protocol_values() {
    assert_eq!(
        mysql_value_to_value(My::UInt(u64::MAX), ColumnType::MYSQL_TYPE_LONGLONG, false),
        Value::Decimal(u64::MAX.to_string())
    );
    assert_eq!(
        mysql_value_to_value(My::Date(2024, 1, 2, 0, 0, 0, 0), ColumnType::MYSQL_TYPE_DATE, false),
        Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
    );
    assert_eq!(
        mysql_value_to_value(My::Time(false, 0, 1, 2, 3, 0), ColumnType::MYSQL_TYPE_TIME, false),
        Value::Time(chrono::NaiveTime::from_hms_opt(1, 2, 3).unwrap())
    );
    assert_eq!(
        mysql_value_to_value(My::Time(true, 1, 2, 0, 0, 0), ColumnType::MYSQL_TYPE_TIME, false),
        Value::String("-26:00:00.000000".into())
    );
    assert_eq!(
        mysql_value_to_value(My::NULL, ColumnType::MYSQL_TYPE_LONG, false),
        Value::Null
    );
}

#[test]
fn test_parameters_bind_as_mysql_values() {
    assert_eq!(value_to_mysql(&Value::Bool(true)), My::Int(1));
    assert_eq!(value_to_mysql(&Value::Int32(5)), My::Int(5));
    assert_eq!(value_to_mysql(&Value::Null), My::NULL);
    assert_eq!(
        value_to_mysql(&Value::from("x")),
        My::Bytes(b"x".to_vec())
    );
    assert_eq!(
        value_to_mysql(&Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())),
        My::Bytes(b"2024-05-01".to_vec())
    );
    assert_eq!(
        value_to_mysql(&Value::Array(vec![Value::Int64(1), Value::Int64(2)])),
        My::Bytes(b"[1,2]".to_vec())
    );
}
