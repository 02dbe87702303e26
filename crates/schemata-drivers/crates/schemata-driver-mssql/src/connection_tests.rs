//! Tests for SQL Server value conversion

use crate::connection::{TiberiusParam, column_data_to_value, values_to_tiberius_params};
use pretty_assertions::assert_eq;
use schemata_core::Value;
use std::borrow::Cow;
use tiberius::numeric::Numeric;
use tiberius::{ColumnData, ToSql};

#[test]
fn test_column_data_converts_to_values() {
    assert_eq!(column_data_to_value(ColumnData::Bit(Some(true))).unwrap(), Value::Bool(true));
    assert_eq!(column_data_to_value(ColumnData::U8(Some(200))).unwrap(), Value::Int16(200));
    assert_eq!(column_data_to_value(ColumnData::I64(Some(-9))).unwrap(), Value::Int64(-9));
    assert_eq!(
        column_data_to_value(ColumnData::String(Some(Cow::Borrowed("hi")))).unwrap(),
        Value::String("hi".into())
    );
    assert_eq!(
        column_data_to_value(ColumnData::Numeric(Some(Numeric::new_with_scale(1050, 2)))).unwrap(),
        Value::Decimal("10.50".into())
    );
    assert_eq!(
        column_data_to_value(ColumnData::Binary(Some(Cow::Owned(vec![1, 2])))).unwrap(),
        Value::Bytes(vec![1, 2])
    );
}

#[test]
fn test_nulls_of_every_type_become_null() {
    assert_eq!(column_data_to_value(ColumnData::I32(None)).unwrap(), Value::Null);
    assert_eq!(column_data_to_value(ColumnData::String(None)).unwrap(), Value::Null);
    assert_eq!(column_data_to_value(ColumnData::Date(None)).unwrap(), Value::Null);
    assert_eq!(column_data_to_value(ColumnData::DateTimeOffset(None)).unwrap(), Value::Null);
}

#[test]
fn test_parameters_widen_where_sql_server_lacks_the_type() {
    let params = values_to_tiberius_params(&[
        Value::Int8(-3),
        Value::Decimal("1.25".into()),
        Value::Null,
        Value::Array(vec![Value::Int32(1), Value::from("a")]),
    ]);
    assert_eq!(
        params,
        vec![
            TiberiusParam::I16(-3),
            TiberiusParam::String("1.25".into()),
            TiberiusParam::Null,
            TiberiusParam::String("[1,\"a\"]".into()),
        ]
    );
}

#[test]
fn test_temporal_parameters_use_native_types() {
    let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let params = values_to_tiberius_params(&[
        Value::Date(date),
        Value::DateTime(date.and_hms_opt(8, 30, 0).unwrap()),
    ]);
    assert!(matches!(params[0].to_sql(), ColumnData::Date(Some(_))));
    assert!(matches!(params[1].to_sql(), ColumnData::DateTime2(Some(_))));
}
