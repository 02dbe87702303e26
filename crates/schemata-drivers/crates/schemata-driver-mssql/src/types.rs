//! SQL Server type table and type map

use schemata_core::typemap::{DialectTypeMap, HostTypeDescriptor, TypeClass, UNLIMITED};
use schemata_core::{DataTypeCategory, DataTypeInfo, Dialect, HostType};

/// Longest sized `varchar`/`varbinary`; beyond it only `(max)` remains.
pub const MAX_BYTE_LENGTH: u64 = 8_000;
/// Longest sized `nvarchar`.
pub const MAX_UNICODE_LENGTH: u64 = 4_000;

pub fn mssql_data_types() -> Vec<DataTypeInfo> {
    vec![
        // Exact numerics
        DataTypeInfo::new("bit", DataTypeCategory::Boolean).common(),
        DataTypeInfo::new("tinyint", DataTypeCategory::Integer)
            .maps_to(HostType::U8)
            .with_desc("0 to 255"),
        DataTypeInfo::new("smallint", DataTypeCategory::Integer).maps_to(HostType::I16),
        DataTypeInfo::new("int", DataTypeCategory::Integer)
            .with_aliases(&["integer"])
            .maps_to(HostType::I32)
            .common(),
        DataTypeInfo::new("bigint", DataTypeCategory::Integer)
            .maps_to(HostType::I64)
            .common(),
        DataTypeInfo::new("decimal", DataTypeCategory::Decimal)
            .with_aliases(&["numeric", "dec"])
            .with_precision(Some(18), Some(38))
            .with_scale(Some(0), Some(38))
            .common(),
        DataTypeInfo::new("money", DataTypeCategory::Decimal),
        DataTypeInfo::new("smallmoney", DataTypeCategory::Decimal),
        // Approximate numerics
        DataTypeInfo::new("real", DataTypeCategory::Float).maps_to(HostType::F32),
        DataTypeInfo::new("float", DataTypeCategory::Float)
            .with_aliases(&["double precision"])
            .with_precision(Some(53), Some(53))
            .maps_to(HostType::F64)
            .common(),
        // Character strings
        DataTypeInfo::new("char", DataTypeCategory::String)
            .with_aliases(&["character"])
            .with_length(Some(1), Some(MAX_BYTE_LENGTH))
            .fixed_length()
            .maps_to(HostType::Char),
        DataTypeInfo::new("varchar", DataTypeCategory::String)
            .with_aliases(&["character varying"])
            .with_length(Some(1), Some(MAX_BYTE_LENGTH)),
        DataTypeInfo::new("text", DataTypeCategory::String).with_desc("Deprecated, use varchar(max)"),
        DataTypeInfo::new("nchar", DataTypeCategory::String)
            .with_aliases(&["national character"])
            .with_length(Some(1), Some(MAX_UNICODE_LENGTH))
            .unicode()
            .fixed_length()
            .maps_to(HostType::Char),
        DataTypeInfo::new("nvarchar", DataTypeCategory::String)
            .with_aliases(&["national character varying"])
            .with_length(Some(1), Some(MAX_UNICODE_LENGTH))
            .unicode()
            .common(),
        DataTypeInfo::new("ntext", DataTypeCategory::String)
            .unicode()
            .with_desc("Deprecated, use nvarchar(max)"),
        DataTypeInfo::new("sysname", DataTypeCategory::String).unicode(),
        DataTypeInfo::new("xml", DataTypeCategory::String).unicode(),
        // Binary strings
        DataTypeInfo::new("binary", DataTypeCategory::Binary)
            .with_length(Some(1), Some(MAX_BYTE_LENGTH))
            .fixed_length(),
        DataTypeInfo::new("varbinary", DataTypeCategory::Binary)
            .with_length(Some(1), Some(MAX_BYTE_LENGTH))
            .common(),
        DataTypeInfo::new("image", DataTypeCategory::Binary)
            .with_desc("Deprecated, use varbinary(max)"),
        DataTypeInfo::new("rowversion", DataTypeCategory::Binary)
            .with_aliases(&["timestamp"])
            .with_desc("Automatically generated binary row version"),
        // Other
        DataTypeInfo::new("uniqueidentifier", DataTypeCategory::Uuid)
            .maps_to(HostType::Uuid)
            .common(),
        // Date and time
        DataTypeInfo::new("date", DataTypeCategory::Date).common(),
        DataTypeInfo::new("time", DataTypeCategory::Time).with_precision(Some(7), Some(7)),
        DataTypeInfo::new("datetime", DataTypeCategory::DateTime),
        DataTypeInfo::new("datetime2", DataTypeCategory::DateTime)
            .with_precision(Some(7), Some(7))
            .common(),
        DataTypeInfo::new("smalldatetime", DataTypeCategory::DateTime),
        DataTypeInfo::new("datetimeoffset", DataTypeCategory::DateTime)
            .with_precision(Some(7), Some(7))
            .maps_to(HostType::DateTimeOffset),
        // Special
        DataTypeInfo::new("sql_variant", DataTypeCategory::Other),
        DataTypeInfo::new("hierarchyid", DataTypeCategory::Other),
        DataTypeInfo::new("geography", DataTypeCategory::Geometry),
        DataTypeInfo::new("geometry", DataTypeCategory::Geometry),
    ]
}

/// `varchar(n)`/`char(n)` for host strings marked as not unicode.
fn ansi_string(
    descriptor: &HostTypeDescriptor,
    name: &str,
    default_length: i32,
) -> Option<String> {
    if descriptor.is_unicode != Some(false) {
        return None;
    }
    let length = descriptor.length.unwrap_or(default_length);
    if length == UNLIMITED || i64::from(length) > MAX_BYTE_LENGTH as i64 {
        Some("varchar(max)".to_string())
    } else {
        Some(format!("{}({})", name, length.max(1)))
    }
}

pub fn mssql_type_map() -> DialectTypeMap {
    DialectTypeMap::builder(Dialect::SqlServer)
        .data_types(mssql_data_types())
        .canonical(TypeClass::Boolean, "bit")
        .canonical(TypeClass::TinyInteger, "tinyint")
        .canonical(TypeClass::SmallInteger, "smallint")
        .canonical(TypeClass::Integer, "int")
        .canonical(TypeClass::BigInteger, "bigint")
        .canonical(TypeClass::Real, "real")
        .canonical(TypeClass::Double, "float")
        .canonical(TypeClass::Decimal, "decimal")
        .canonical(TypeClass::Text, "nvarchar")
        .canonical(TypeClass::FixedText, "nchar")
        .canonical(TypeClass::Binary, "varbinary")
        .canonical(TypeClass::Guid, "uniqueidentifier")
        .canonical(TypeClass::Date, "date")
        .canonical(TypeClass::Time, "time")
        .canonical(TypeClass::DateTime, "datetime2")
        .canonical(TypeClass::DateTimeOffset, "datetimeoffset")
        .canonical(TypeClass::Interval, "time")
        .canonical(TypeClass::Json, "nvarchar(max)")
        .unlimited(TypeClass::Text, "nvarchar(max)")
        .unlimited(TypeClass::FixedText, "nvarchar(max)")
        .unlimited(TypeClass::Binary, "varbinary(max)")
        // tinyint is unsigned, so signed and wider unsigned values step up
        .exact(HostType::I8, |_, _| Some("smallint".into()))
        .exact(HostType::U16, |_, _| Some("int".into()))
        .exact(HostType::U32, |_, _| Some("bigint".into()))
        .exact(HostType::U64, |_, _| Some("decimal(20,0)".into()))
        .exact(HostType::String, |descriptor, settings| {
            ansi_string(descriptor, "varchar", settings.string_length)
        })
        .exact(HostType::Char, |descriptor, _| ansi_string(descriptor, "char", 1))
        .composite_fallback(|host, _, _| match host {
            HostType::List(_) | HostType::Map(_, _) | HostType::Object(_) => {
                Some("nvarchar(max)".to_string())
            }
            _ => None,
        })
        .reverse_hook(|parsed| {
            // float(1..24) is stored as real
            if parsed.base_type_name == "float" && parsed.precision.is_some_and(|p| p <= 24) {
                return Some(HostTypeDescriptor::new(HostType::F32));
            }
            // the spelling chosen for U64 above
            parsed
                .is_whole_numeric(20)
                .then(|| HostTypeDescriptor::new(HostType::U64).with_precision(20, Some(0)))
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use schemata_core::typemap::TypeMappingSettings;

    fn resolve(descriptor: HostTypeDescriptor) -> String {
        mssql_type_map()
            .resolve_with(&descriptor, &TypeMappingSettings::default())
            .unwrap()
    }

    #[test]
    fn integers_step_up_around_unsigned_tinyint() {
        assert_eq!(resolve(HostType::U8.into()), "tinyint");
        assert_eq!(resolve(HostType::I8.into()), "smallint");
        assert_eq!(resolve(HostType::U16.into()), "int");
        assert_eq!(resolve(HostType::U32.into()), "bigint");
        assert_eq!(resolve(HostType::U64.into()), "decimal(20,0)");
        assert_eq!(resolve(HostType::Bool.into()), "bit");
    }

    #[test]
    fn strings_are_unicode_unless_asked_otherwise() {
        assert_eq!(resolve(HostType::String.into()), "nvarchar(max)");
        assert_eq!(
            resolve(HostTypeDescriptor::new(HostType::String).with_length(100)),
            "nvarchar(100)"
        );
        assert_eq!(
            resolve(HostTypeDescriptor::new(HostType::String).with_length(4_001)),
            "nvarchar(max)"
        );
        assert_eq!(resolve(HostType::Char.into()), "nchar(1)");
        assert_eq!(
            resolve(
                HostTypeDescriptor::new(HostType::String)
                    .with_length(100)
                    .unicode(false)
            ),
            "varchar(100)"
        );
        assert_eq!(
            resolve(
                HostTypeDescriptor::new(HostType::String)
                    .with_length(9_000)
                    .unicode(false)
            ),
            "varchar(max)"
        );
        assert_eq!(
            resolve(HostTypeDescriptor::new(HostType::Char).unicode(false)),
            "char(1)"
        );
    }

    #[test]
    fn binary_and_decimal_sizes() {
        assert_eq!(resolve(HostType::Bytes.into()), "varbinary(max)");
        assert_eq!(
            resolve(HostTypeDescriptor::new(HostType::Bytes).with_length(16)),
            "varbinary(16)"
        );
        assert_eq!(resolve(HostType::Decimal.into()), "decimal(16,4)");
        assert_eq!(
            resolve(HostTypeDescriptor::new(HostType::Decimal).with_precision(50, Some(2))),
            "decimal(38,2)"
        );
    }

    #[test]
    fn temporals_and_documents() {
        assert_eq!(resolve(HostType::DateTime.into()), "datetime2");
        assert_eq!(resolve(HostType::DateTimeOffset.into()), "datetimeoffset");
        assert_eq!(resolve(HostType::Duration.into()), "time");
        assert_eq!(resolve(HostType::Uuid.into()), "uniqueidentifier");
        assert_eq!(resolve(HostType::Json.into()), "nvarchar(max)");
        assert_eq!(
            resolve(HostType::Map(Box::new(HostType::String), Box::new(HostType::I32)).into()),
            "nvarchar(max)"
        );
    }

    #[test]
    fn catalog_spellings_reverse() {
        let map = mssql_type_map();
        assert_eq!(map.reverse("bit").unwrap().host_type(), &HostType::Bool);
        assert_eq!(map.reverse("tinyint").unwrap().host_type(), &HostType::U8);
        assert_eq!(map.reverse("float(24)").unwrap().host_type(), &HostType::F32);
        assert_eq!(map.reverse("float(53)").unwrap().host_type(), &HostType::F64);
        assert_eq!(
            map.reverse("decimal(20,0)").unwrap().host_type(),
            &HostType::U64
        );

        let nvarchar = map.reverse("nvarchar(max)").unwrap();
        assert_eq!(nvarchar.host_type(), &HostType::String);
        assert!(nvarchar.is_unlimited());
        assert_eq!(nvarchar.is_unicode, Some(true));

        let varchar = map.reverse("varchar(30)").unwrap();
        assert_eq!(varchar.length, Some(30));
        assert_eq!(varchar.is_unicode, None);

        assert_eq!(
            map.reverse("datetimeoffset(7)").unwrap().host_type(),
            &HostType::DateTimeOffset
        );
        assert!(map.reverse("hstore").is_err());
    }

    #[test]
    fn every_scalar_round_trips_within_its_family() {
        let map = mssql_type_map();
        let settings = TypeMappingSettings::default();
        for host in HostType::scalars() {
            let declared = map
                .resolve_with(&HostTypeDescriptor::new(host.clone()), &settings)
                .unwrap();
            let back = map.reverse(&declared).unwrap();
            assert_eq!(
                back.host_type().family(),
                host.family(),
                "{} declared as {}",
                host,
                declared
            );
        }
    }
}
