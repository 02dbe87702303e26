//! Tests for forward and reverse type resolution

use super::*;
use crate::DataTypeCategory;
use crate::model::Column;
use pretty_assertions::assert_eq;

fn sample_map() -> DialectTypeMap {
    DialectTypeMap::builder(Dialect::Other("sample".into()))
        .data_types(vec![
            DataTypeInfo::new("boolean", DataTypeCategory::Boolean).maps_to(HostType::Bool),
            DataTypeInfo::new("integer", DataTypeCategory::Integer)
                .with_aliases(&["int", "int4"])
                .maps_to(HostType::I32),
            DataTypeInfo::new("bigint", DataTypeCategory::Integer).maps_to(HostType::I64),
            DataTypeInfo::new("numeric", DataTypeCategory::Decimal)
                .with_aliases(&["decimal"])
                .with_precision(None, Some(38))
                .with_scale(None, Some(38)),
            DataTypeInfo::new("varchar", DataTypeCategory::String)
                .with_length(None, Some(8000)),
            DataTypeInfo::new("char", DataTypeCategory::String)
                .with_length(Some(1), Some(255))
                .fixed_length(),
            DataTypeInfo::new("text", DataTypeCategory::String),
            DataTypeInfo::new("nvarchar", DataTypeCategory::String)
                .with_length(None, Some(4000))
                .unicode(),
            DataTypeInfo::new("timestamp", DataTypeCategory::DateTime)
                .with_precision(None, Some(6)),
            DataTypeInfo::new("blob", DataTypeCategory::Binary),
        ])
        .canonical(TypeClass::Boolean, "boolean")
        .canonical(TypeClass::Integer, "integer")
        .canonical(TypeClass::BigInteger, "bigint")
        .canonical(TypeClass::Decimal, "numeric")
        .canonical(TypeClass::Text, "varchar")
        .canonical(TypeClass::FixedText, "char")
        .canonical(TypeClass::Binary, "blob")
        .canonical(TypeClass::DateTime, "timestamp")
        .canonical(TypeClass::Guid, "char(36)")
        .unlimited(TypeClass::Text, "text")
        .exact(HostType::U64, |_, _| Some("numeric(20,0)".into()))
        .exact(HostType::String, |desc, _| {
            (desc.is_unicode == Some(true)).then(|| match desc.length {
                Some(length) if length <= 4000 => format!("nvarchar({})", length),
                _ => "nvarchar(max)".to_string(),
            })
        })
        .composite_fallback(|host, map, settings| match host {
            HostType::List(element) => map
                .resolve_with(&HostTypeDescriptor::new((**element).clone()), settings)
                .ok()
                .map(|element| format!("{}[]", element)),
            _ => None,
        })
        .reverse_hook(|parsed| {
            (parsed.base_type_name == "boolean" && parsed.precision == Some(8))
                .then(|| HostTypeDescriptor::new(HostType::U8))
        })
        .build()
}

fn settings() -> TypeMappingSettings {
    TypeMappingSettings::default()
}

#[test]
fn test_exact_rule_wins_over_canonical() {
    let map = sample_map();
    let wide = HostTypeDescriptor::new(HostType::String)
        .with_length(5000)
        .unicode(true);
    assert_eq!(map.resolve_with(&wide, &settings()).unwrap(), "nvarchar(max)");

    let narrow = HostTypeDescriptor::new(HostType::String).unicode(true).with_length(20);
    assert_eq!(map.resolve_with(&narrow, &settings()).unwrap(), "nvarchar(20)");
}

#[test]
fn test_exact_rule_declining_falls_through() {
    let map = sample_map();
    let plain = HostTypeDescriptor::new(HostType::String).with_length(100);
    assert_eq!(map.resolve_with(&plain, &settings()).unwrap(), "varchar(100)");
}

#[test]
fn test_unlimited_and_oversized_text() {
    let map = sample_map();
    let unbounded = HostTypeDescriptor::new(HostType::String);
    assert_eq!(map.resolve_with(&unbounded, &settings()).unwrap(), "text");

    let oversized = HostTypeDescriptor::new(HostType::String).with_length(9000);
    assert_eq!(map.resolve_with(&oversized, &settings()).unwrap(), "text");

    let bounded = TypeMappingSettings {
        string_length: 255,
        ..settings()
    };
    assert_eq!(map.resolve_with(&unbounded, &bounded).unwrap(), "varchar(255)");
}

#[test]
fn test_decimal_defaults_and_clamping() {
    let map = sample_map();
    let decimal = HostTypeDescriptor::new(HostType::Decimal);
    assert_eq!(map.resolve_with(&decimal, &settings()).unwrap(), "numeric(16,4)");

    let sized = HostTypeDescriptor::new(HostType::Decimal).with_precision(10, Some(2));
    assert_eq!(map.resolve_with(&sized, &settings()).unwrap(), "numeric(10,2)");

    let precision_only = HostTypeDescriptor::new(HostType::Decimal).with_precision(3, None);
    assert_eq!(map.resolve_with(&precision_only, &settings()).unwrap(), "numeric(3,3)");

    let too_wide = HostTypeDescriptor::new(HostType::Decimal).with_precision(60, Some(2));
    assert_eq!(map.resolve_with(&too_wide, &settings()).unwrap(), "numeric(38,2)");
}

#[test]
fn test_temporal_precision_only_when_requested() {
    let map = sample_map();
    let plain = HostTypeDescriptor::new(HostType::DateTime);
    assert_eq!(map.resolve_with(&plain, &settings()).unwrap(), "timestamp");
    let precise = HostTypeDescriptor::new(HostType::DateTime).with_precision(3, None);
    assert_eq!(map.resolve_with(&precise, &settings()).unwrap(), "timestamp(3)");
}

#[test]
fn test_fixed_text_and_literal_canonicals() {
    let map = sample_map();
    assert_eq!(
        map.resolve_with(&HostType::Char.into(), &settings()).unwrap(),
        "char(1)"
    );
    assert_eq!(
        map.resolve_with(&HostType::Uuid.into(), &settings()).unwrap(),
        "char(36)"
    );
}

#[test]
fn test_composite_fallback_and_text_default() {
    let map = sample_map();
    let list = HostTypeDescriptor::new(HostType::List(Box::new(HostType::I32)));
    assert_eq!(map.resolve_with(&list, &settings()).unwrap(), "integer[]");

    // no fallback for maps: stored as text at the default string length
    let dict = HostTypeDescriptor::new(HostType::Map(
        Box::new(HostType::String),
        Box::new(HostType::I32),
    ));
    assert_eq!(map.resolve_with(&dict, &settings()).unwrap(), "text");
}

#[test]
fn test_unresolvable_host_type_is_named() {
    let map = DialectTypeMap::builder(Dialect::Other("bare".into()))
        .data_types(vec![DataTypeInfo::new("integer", DataTypeCategory::Integer)])
        .canonical(TypeClass::Integer, "integer")
        .build();
    let err = map
        .resolve_with(&HostTypeDescriptor::new(HostType::Json), &settings())
        .unwrap_err();
    match err {
        SchemataError::TypeMapping(message) => assert!(message.contains("json"), "{}", message),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_reverse_lookup_by_alias_and_case() {
    let map = sample_map();
    let resolved = map.reverse("INT4").unwrap();
    assert_eq!(resolved.host_type(), &HostType::I32);

    let varchar = map.reverse("VARCHAR(100)").unwrap();
    assert_eq!(varchar.host_type(), &HostType::String);
    assert_eq!(varchar.length, Some(100));
    assert_eq!(varchar.is_fixed_length, Some(false));

    let wide = map.reverse("nvarchar(20)").unwrap();
    assert_eq!(wide.is_unicode, Some(true));
}

#[test]
fn test_reverse_carries_precision() {
    let map = sample_map();
    let decimal = map.reverse("decimal(10,2)").unwrap();
    assert_eq!(decimal.host_type(), &HostType::Decimal);
    assert_eq!(decimal.precision, Some(10));
    assert_eq!(decimal.scale, Some(2));

    let whole = map.reverse("numeric(20,0)").unwrap();
    assert_eq!(whole.host_type(), &HostType::Decimal);
    assert_eq!(whole.precision, Some(20));
    assert_eq!(map.reverse("numeric(20,2)").unwrap().host_type(), &HostType::Decimal);
}

#[test]
fn test_whole_numeric_spellings() {
    assert!(DialectTypeDescriptor::parse("NUMERIC(20, 0)").is_whole_numeric(20));
    assert!(DialectTypeDescriptor::parse("decimal(20)").is_whole_numeric(20));
    assert!(!DialectTypeDescriptor::parse("decimal(20,2)").is_whole_numeric(20));
    assert!(!DialectTypeDescriptor::parse("bigint(20)").is_whole_numeric(20));
}

#[test]
fn test_reverse_hook_and_arrays() {
    let map = sample_map();
    assert_eq!(map.reverse("boolean(8)").unwrap().host_type(), &HostType::U8);
    assert_eq!(
        map.reverse("integer[]").unwrap().host_type(),
        &HostType::List(Box::new(HostType::I32))
    );
}

#[test]
fn test_reverse_unknown_names_the_raw_type() {
    let map = sample_map();
    match map.reverse("geography(point)").unwrap_err() {
        SchemataError::TypeMapping(message) => {
            assert!(message.contains("geography(point)"), "{}", message)
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_column_override_wins() {
    let map = sample_map();
    let column = Column::new("price", HostType::Decimal)
        .with_type_override(Dialect::Other("sample".into()), "money");
    assert_eq!(map.resolve_column_with(&column, &settings()).unwrap(), "money");

    let shorthand = Column::new("price", HostType::Decimal)
        .with_type_shorthand("{sample:decimal(12,3),mysql:decimal(5,1)}");
    assert_eq!(
        map.resolve_column_with(&shorthand, &settings()).unwrap(),
        "decimal(12,3)"
    );

    let other_dialect = Column::new("price", HostType::Decimal)
        .with_type_shorthand("{mysql:decimal(5,1)}");
    assert_eq!(
        map.resolve_column_with(&other_dialect, &settings()).unwrap(),
        "numeric(16,4)"
    );
}

#[test]
fn test_find_and_enumerate() {
    let map = sample_map();
    assert_eq!(map.find("Decimal").map(|info| info.name.as_ref()), Some("numeric"));
    assert!(map.find("money").is_none());
    assert_eq!(map.data_types().len(), 10);
}
