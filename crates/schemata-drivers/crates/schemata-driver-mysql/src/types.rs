//! MySQL type table and type map

use schemata_core::typemap::{DialectTypeMap, HostTypeDescriptor, TypeClass};
use schemata_core::{DataTypeCategory, DataTypeInfo, Dialect, HostType};

/// Longest `varchar(n)` that fits a row in utf8mb4.
pub const MAX_VARCHAR_LENGTH: u64 = 16_383;

pub fn mysql_data_types() -> Vec<DataTypeInfo> {
    vec![
        // Integer types
        DataTypeInfo::new("tinyint", DataTypeCategory::Integer)
            .with_aliases(&["int1"])
            .maps_to(HostType::I8),
        DataTypeInfo::new("smallint", DataTypeCategory::Integer)
            .with_aliases(&["int2"])
            .maps_to(HostType::I16),
        DataTypeInfo::new("mediumint", DataTypeCategory::Integer)
            .with_aliases(&["int3", "middleint"])
            .maps_to(HostType::I32),
        DataTypeInfo::new("int", DataTypeCategory::Integer)
            .with_aliases(&["integer", "int4"])
            .maps_to(HostType::I32)
            .common(),
        DataTypeInfo::new("bigint", DataTypeCategory::Integer)
            .with_aliases(&["int8", "serial"])
            .maps_to(HostType::I64)
            .common(),
        DataTypeInfo::new("bit", DataTypeCategory::Binary).with_precision(Some(1), Some(64)),
        DataTypeInfo::new("boolean", DataTypeCategory::Boolean).with_aliases(&["bool"]),
        // Floating point
        DataTypeInfo::new("float", DataTypeCategory::Float)
            .with_aliases(&["float4"])
            .maps_to(HostType::F32),
        DataTypeInfo::new("double", DataTypeCategory::Float)
            .with_aliases(&["double precision", "real", "float8"])
            .maps_to(HostType::F64)
            .common(),
        // Fixed precision
        DataTypeInfo::new("decimal", DataTypeCategory::Decimal)
            .with_aliases(&["numeric", "dec", "fixed"])
            .with_precision(Some(10), Some(65))
            .with_scale(Some(0), Some(30))
            .common(),
        // Character types
        DataTypeInfo::new("char", DataTypeCategory::String)
            .with_aliases(&["character"])
            .with_length(Some(1), Some(255))
            .fixed_length()
            .maps_to(HostType::Char),
        DataTypeInfo::new("varchar", DataTypeCategory::String)
            .with_aliases(&["character varying"])
            .with_length(None, Some(MAX_VARCHAR_LENGTH))
            .common(),
        DataTypeInfo::new("tinytext", DataTypeCategory::String),
        DataTypeInfo::new("text", DataTypeCategory::String).common(),
        DataTypeInfo::new("mediumtext", DataTypeCategory::String),
        DataTypeInfo::new("longtext", DataTypeCategory::String)
            .with_desc("Up to 4 GB of text"),
        // Binary
        DataTypeInfo::new("binary", DataTypeCategory::Binary)
            .with_length(Some(1), Some(255))
            .fixed_length(),
        DataTypeInfo::new("varbinary", DataTypeCategory::Binary).with_length(None, Some(65_535)),
        DataTypeInfo::new("tinyblob", DataTypeCategory::Binary),
        DataTypeInfo::new("blob", DataTypeCategory::Binary),
        DataTypeInfo::new("mediumblob", DataTypeCategory::Binary),
        DataTypeInfo::new("longblob", DataTypeCategory::Binary).common(),
        // Date/time
        DataTypeInfo::new("date", DataTypeCategory::Date).common(),
        DataTypeInfo::new("time", DataTypeCategory::Time).with_precision(None, Some(6)),
        DataTypeInfo::new("datetime", DataTypeCategory::DateTime)
            .with_precision(None, Some(6))
            .common(),
        DataTypeInfo::new("timestamp", DataTypeCategory::DateTime)
            .with_precision(None, Some(6))
            .maps_to(HostType::DateTimeOffset)
            .with_desc("Stored as UTC, converted to the session time zone"),
        DataTypeInfo::new("year", DataTypeCategory::Integer).maps_to(HostType::I16),
        // JSON
        DataTypeInfo::new("json", DataTypeCategory::Json).common(),
        // Enumerations
        DataTypeInfo::new("enum", DataTypeCategory::String),
        DataTypeInfo::new("set", DataTypeCategory::String),
        // Spatial
        DataTypeInfo::new("geometry", DataTypeCategory::Geometry),
        DataTypeInfo::new("point", DataTypeCategory::Geometry),
        DataTypeInfo::new("linestring", DataTypeCategory::Geometry),
        DataTypeInfo::new("polygon", DataTypeCategory::Geometry),
        DataTypeInfo::new("multipoint", DataTypeCategory::Geometry),
        DataTypeInfo::new("multilinestring", DataTypeCategory::Geometry),
        DataTypeInfo::new("multipolygon", DataTypeCategory::Geometry),
        DataTypeInfo::new("geometrycollection", DataTypeCategory::Geometry),
    ]
}

pub fn mysql_type_map() -> DialectTypeMap {
    DialectTypeMap::builder(Dialect::MySql)
        .data_types(mysql_data_types())
        .canonical(TypeClass::Boolean, "tinyint(1)")
        .canonical(TypeClass::TinyInteger, "tinyint")
        .canonical(TypeClass::SmallInteger, "smallint")
        .canonical(TypeClass::Integer, "int")
        .canonical(TypeClass::BigInteger, "bigint")
        .canonical(TypeClass::Real, "float")
        .canonical(TypeClass::Double, "double")
        .canonical(TypeClass::Decimal, "decimal")
        .canonical(TypeClass::Text, "varchar")
        .canonical(TypeClass::FixedText, "char")
        .canonical(TypeClass::Binary, "varbinary")
        .canonical(TypeClass::Guid, "char(36)")
        .canonical(TypeClass::Date, "date")
        .canonical(TypeClass::Time, "time")
        .canonical(TypeClass::DateTime, "datetime")
        .canonical(TypeClass::DateTimeOffset, "timestamp")
        .canonical(TypeClass::Interval, "time")
        .canonical(TypeClass::Json, "json")
        .unlimited(TypeClass::Text, "longtext")
        .unlimited(TypeClass::FixedText, "longtext")
        .unlimited(TypeClass::Binary, "longblob")
        .exact(HostType::U8, |_, _| Some("tinyint unsigned".into()))
        .exact(HostType::U16, |_, _| Some("smallint unsigned".into()))
        .exact(HostType::U32, |_, _| Some("int unsigned".into()))
        .exact(HostType::U64, |_, _| Some("bigint unsigned".into()))
        .composite_fallback(|host, _, _| match host {
            HostType::List(_) | HostType::Map(_, _) | HostType::Object(_) => {
                Some("json".to_string())
            }
            _ => None,
        })
        .reverse_hook(|parsed| {
            let base = parsed.base_without_modifiers();
            let host_type = match base {
                "tinyint" | "bit" if parsed.precision == Some(1) && !parsed.is_unsigned() => {
                    HostType::Bool
                }
                "tinyint" | "int1" if parsed.is_unsigned() => HostType::U8,
                "smallint" | "int2" | "year" if parsed.is_unsigned() => HostType::U16,
                "mediumint" | "int" | "integer" | "int3" | "int4" if parsed.is_unsigned() => {
                    HostType::U32
                }
                "bigint" | "int8" if parsed.is_unsigned() => HostType::U64,
                "serial" => {
                    return Some(
                        HostTypeDescriptor::new(HostType::U64).auto_increment(true),
                    );
                }
                _ => return None,
            };
            Some(HostTypeDescriptor::new(host_type))
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use schemata_core::TypeFamily;
    use schemata_core::typemap::TypeMappingSettings;

    fn resolve(descriptor: HostTypeDescriptor) -> String {
        mysql_type_map()
            .resolve_with(&descriptor, &TypeMappingSettings::default())
            .unwrap()
    }

    #[test]
    fn unsigned_types_keep_their_width() {
        assert_eq!(resolve(HostType::U8.into()), "tinyint unsigned");
        assert_eq!(resolve(HostType::U16.into()), "smallint unsigned");
        assert_eq!(resolve(HostType::U32.into()), "int unsigned");
        assert_eq!(resolve(HostType::U64.into()), "bigint unsigned");
        assert_eq!(resolve(HostType::I8.into()), "tinyint");
    }

    #[test]
    fn booleans_and_guids_use_sized_types() {
        assert_eq!(resolve(HostType::Bool.into()), "tinyint(1)");
        assert_eq!(resolve(HostType::Uuid.into()), "char(36)");
    }

    #[test]
    fn strings_size_or_fall_back_to_longtext() {
        assert_eq!(resolve(HostType::String.into()), "longtext");
        assert_eq!(
            resolve(HostTypeDescriptor::new(HostType::String).with_length(100)),
            "varchar(100)"
        );
        assert_eq!(
            resolve(HostTypeDescriptor::new(HostType::String).with_length(20_000)),
            "longtext"
        );
        assert_eq!(resolve(HostType::Char.into()), "char(1)");
        assert_eq!(resolve(HostType::Bytes.into()), "longblob");
        assert_eq!(
            resolve(HostTypeDescriptor::new(HostType::Bytes).with_length(16)),
            "varbinary(16)"
        );
    }

    #[test]
    fn decimals_clamp_to_mysql_limits() {
        assert_eq!(resolve(HostType::Decimal.into()), "decimal(16,4)");
        assert_eq!(
            resolve(HostTypeDescriptor::new(HostType::Decimal).with_precision(80, Some(2))),
            "decimal(65,2)"
        );
    }

    #[test]
    fn composites_become_json() {
        assert_eq!(resolve(HostType::List(Box::new(HostType::I32)).into()), "json");
        assert_eq!(resolve(HostType::Object("Address".into()).into()), "json");
        assert_eq!(resolve(HostType::Duration.into()), "time");
        assert_eq!(resolve(HostType::DateTimeOffset.into()), "timestamp");
    }

    #[test]
    fn catalog_spellings_reverse() {
        let map = mysql_type_map();
        assert_eq!(map.reverse("tinyint(1)").unwrap().host_type(), &HostType::Bool);
        assert_eq!(map.reverse("bit(1)").unwrap().host_type(), &HostType::Bool);
        assert_eq!(map.reverse("tinyint(4)").unwrap().host_type(), &HostType::I8);
        assert_eq!(
            map.reverse("int(10) unsigned").unwrap().host_type(),
            &HostType::U32
        );
        assert_eq!(
            map.reverse("bigint unsigned").unwrap().host_type(),
            &HostType::U64
        );

        let varchar = map.reverse("varchar(255)").unwrap();
        assert_eq!(varchar.host_type(), &HostType::String);
        assert_eq!(varchar.length, Some(255));

        assert_eq!(map.reverse("year").unwrap().host_type(), &HostType::I16);
        assert_eq!(
            map.reverse("enum('a','b')").unwrap().host_type().family(),
            TypeFamily::Text
        );
        assert!(map.reverse("hstore").is_err());
    }

    #[test]
    fn decimal_20_stays_decimal() {
        let decimal = mysql_type_map().reverse("decimal(20,0)").unwrap();
        assert_eq!(decimal.host_type(), &HostType::Decimal);
        assert_eq!(decimal.precision, Some(20));
    }

    #[test]
    fn every_scalar_round_trips_within_its_family() {
        let map = mysql_type_map();
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
