//! Tests for type descriptor parsing

use super::*;

#[test]
fn test_decimal_with_precision_and_scale() {
    let desc = DialectTypeDescriptor::parse("decimal(10,2)");
    assert_eq!(desc.base_type_name, "decimal");
    assert_eq!(desc.precision, Some(10));
    assert_eq!(desc.scale, Some(2));
    assert_eq!(desc.length, None);
}

#[test]
fn test_varchar_with_length() {
    let desc = DialectTypeDescriptor::parse("varchar(255)");
    assert_eq!(desc.base_type_name, "varchar");
    assert_eq!(desc.length, Some(255));
    assert_eq!(desc.precision, None);
    assert_eq!(desc.is_fixed_length, Some(false));
    assert_eq!(desc.is_unicode, None);
}

#[test]
fn test_no_parentheses_has_no_sizes() {
    let desc = DialectTypeDescriptor::parse("char");
    assert_eq!(desc.base_type_name, "char");
    assert_eq!(desc.length, None);
    assert_eq!(desc.precision, None);
    assert_eq!(desc.scale, None);
    assert_eq!(desc.is_fixed_length, Some(true));
}

#[test]
fn test_whitespace_is_ignored() {
    let desc = DialectTypeDescriptor::parse("  nvarchar (   255 )  ");
    assert_eq!(desc.base_type_name, "nvarchar");
    assert_eq!(desc.length, Some(255));
    assert_eq!(desc.is_unicode, Some(true));
    assert_eq!(desc.raw_type_name, "  nvarchar (   255 )  ");
}

#[test]
fn test_max_marker_is_unlimited() {
    let desc = DialectTypeDescriptor::parse("NVARCHAR(MAX)");
    assert_eq!(desc.base_type_name, "nvarchar");
    assert_eq!(desc.length, Some(UNLIMITED));

    let catalog = DialectTypeDescriptor::parse("varbinary(-1)");
    assert_eq!(catalog.length, Some(UNLIMITED));
}

#[test]
fn test_one_number_on_numeric_base_is_precision() {
    let desc = DialectTypeDescriptor::parse("tinyint(1)");
    assert_eq!(desc.precision, Some(1));
    assert_eq!(desc.scale, None);
    assert_eq!(desc.length, None);
}

#[test]
fn test_group_in_the_middle() {
    let desc = DialectTypeDescriptor::parse("timestamp(6) with time zone");
    assert_eq!(desc.base_type_name, "timestamp with time zone");
    assert_eq!(desc.precision, Some(6));

    let pg = DialectTypeDescriptor::parse("character varying(40)[]");
    assert_eq!(pg.base_type_name, "character varying");
    assert!(pg.is_array);
    assert_eq!(pg.length, Some(40));
}

#[test]
fn test_serial_is_auto_increment() {
    assert_eq!(
        DialectTypeDescriptor::parse("bigserial").is_auto_increment,
        Some(true)
    );
    assert_eq!(DialectTypeDescriptor::parse("bigint").is_auto_increment, None);
}

#[test]
fn test_fixed_and_wide_character_types() {
    assert_eq!(DialectTypeDescriptor::parse("bpchar(3)").is_fixed_length, Some(true));
    assert_eq!(DialectTypeDescriptor::parse("nchar(10)").is_unicode, Some(true));
    assert_eq!(
        DialectTypeDescriptor::parse("national character varying(20)").is_unicode,
        Some(true)
    );
    assert_eq!(DialectTypeDescriptor::parse("numeric(5)").is_unicode, None);
    assert_eq!(DialectTypeDescriptor::parse("binary(16)").is_fixed_length, None);
}

#[test]
fn test_unsigned_modifiers() {
    let desc = DialectTypeDescriptor::parse("int(10) unsigned zerofill");
    assert_eq!(desc.base_type_name, "int unsigned zerofill");
    assert!(desc.is_unsigned());
    assert_eq!(desc.base_without_modifiers(), "int");
    assert!(!DialectTypeDescriptor::parse("int").is_unsigned());
}

#[test]
fn test_host_descriptor_drops_nullable() {
    let desc = HostTypeDescriptor::new(HostType::Nullable(Box::new(HostType::String)))
        .with_length(100)
        .unicode(true);
    assert_eq!(desc.host_type(), &HostType::String);
    assert_eq!(desc.length, Some(100));
    assert!(!desc.is_unlimited());
}
