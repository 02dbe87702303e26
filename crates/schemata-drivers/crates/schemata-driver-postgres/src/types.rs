//! PostgreSQL type table and type map

use schemata_core::typemap::{DialectTypeMap, HostTypeDescriptor, TypeClass};
use schemata_core::{DataTypeCategory, DataTypeInfo, Dialect, HostType};

/// Longest `varchar(n)` PostgreSQL accepts.
pub const MAX_VARCHAR_LENGTH: u64 = 10_485_760;

pub fn postgres_data_types() -> Vec<DataTypeInfo> {
    vec![
        // Integer types
        DataTypeInfo::new("smallint", DataTypeCategory::Integer)
            .with_aliases(&["int2", "smallserial", "serial2"])
            .maps_to(HostType::I16),
        DataTypeInfo::new("integer", DataTypeCategory::Integer)
            .with_aliases(&["int", "int4", "serial", "serial4"])
            .maps_to(HostType::I32)
            .common(),
        DataTypeInfo::new("bigint", DataTypeCategory::Integer)
            .with_aliases(&["int8", "bigserial", "serial8"])
            .maps_to(HostType::I64)
            .common(),
        DataTypeInfo::new("oid", DataTypeCategory::Integer).maps_to(HostType::U32),
        // Floating point
        DataTypeInfo::new("real", DataTypeCategory::Float)
            .with_aliases(&["float4"])
            .maps_to(HostType::F32),
        DataTypeInfo::new("double precision", DataTypeCategory::Float)
            .with_aliases(&["float8", "float"])
            .maps_to(HostType::F64)
            .common(),
        // Fixed precision
        DataTypeInfo::new("numeric", DataTypeCategory::Decimal)
            .with_aliases(&["decimal"])
            .with_precision(None, Some(255))
            .with_scale(None, Some(255))
            .common(),
        DataTypeInfo::new("money", DataTypeCategory::Decimal),
        // Character types
        DataTypeInfo::new("varchar", DataTypeCategory::String)
            .with_aliases(&["character varying"])
            .with_length(None, Some(MAX_VARCHAR_LENGTH))
            .common(),
        DataTypeInfo::new("char", DataTypeCategory::String)
            .with_aliases(&["character", "bpchar"])
            .with_length(Some(1), Some(MAX_VARCHAR_LENGTH))
            .fixed_length()
            .maps_to(HostType::Char),
        DataTypeInfo::new("text", DataTypeCategory::String)
            .common()
            .with_desc("Variable-length text without a limit"),
        DataTypeInfo::new("citext", DataTypeCategory::String),
        DataTypeInfo::new("name", DataTypeCategory::String),
        DataTypeInfo::new("xml", DataTypeCategory::String),
        // Binary
        DataTypeInfo::new("bytea", DataTypeCategory::Binary).common(),
        DataTypeInfo::new("bit", DataTypeCategory::Binary).with_length(Some(1), None),
        DataTypeInfo::new("bit varying", DataTypeCategory::Binary)
            .with_aliases(&["varbit"])
            .with_length(None, None),
        // Boolean
        DataTypeInfo::new("boolean", DataTypeCategory::Boolean)
            .with_aliases(&["bool"])
            .common(),
        // Date/time
        DataTypeInfo::new("date", DataTypeCategory::Date).common(),
        DataTypeInfo::new("time", DataTypeCategory::Time)
            .with_aliases(&["time without time zone"])
            .with_precision(None, Some(6)),
        DataTypeInfo::new("timetz", DataTypeCategory::Time)
            .with_aliases(&["time with time zone"])
            .with_precision(None, Some(6)),
        DataTypeInfo::new("timestamp", DataTypeCategory::DateTime)
            .with_aliases(&["timestamp without time zone"])
            .with_precision(None, Some(6))
            .common(),
        DataTypeInfo::new("timestamptz", DataTypeCategory::DateTime)
            .with_aliases(&["timestamp with time zone"])
            .with_precision(None, Some(6))
            .maps_to(HostType::DateTimeOffset)
            .common(),
        DataTypeInfo::new("interval", DataTypeCategory::Interval),
        // JSON
        DataTypeInfo::new("json", DataTypeCategory::Json),
        DataTypeInfo::new("jsonb", DataTypeCategory::Json)
            .common()
            .with_desc("Binary JSON, indexable"),
        // UUID
        DataTypeInfo::new("uuid", DataTypeCategory::Uuid).common(),
        // Network
        DataTypeInfo::new("inet", DataTypeCategory::Network),
        DataTypeInfo::new("cidr", DataTypeCategory::Network),
        DataTypeInfo::new("macaddr", DataTypeCategory::Network),
        DataTypeInfo::new("macaddr8", DataTypeCategory::Network),
        // Geometric
        DataTypeInfo::new("point", DataTypeCategory::Geometry),
        DataTypeInfo::new("line", DataTypeCategory::Geometry),
        DataTypeInfo::new("lseg", DataTypeCategory::Geometry),
        DataTypeInfo::new("box", DataTypeCategory::Geometry),
        DataTypeInfo::new("path", DataTypeCategory::Geometry),
        DataTypeInfo::new("polygon", DataTypeCategory::Geometry),
        DataTypeInfo::new("circle", DataTypeCategory::Geometry),
        DataTypeInfo::new("geometry", DataTypeCategory::Geometry),
        DataTypeInfo::new("geography", DataTypeCategory::Geometry),
        // Ranges and search
        DataTypeInfo::new("int4range", DataTypeCategory::Other),
        DataTypeInfo::new("int8range", DataTypeCategory::Other),
        DataTypeInfo::new("numrange", DataTypeCategory::Other),
        DataTypeInfo::new("tsrange", DataTypeCategory::Other),
        DataTypeInfo::new("tstzrange", DataTypeCategory::Other),
        DataTypeInfo::new("daterange", DataTypeCategory::Other),
        DataTypeInfo::new("tsvector", DataTypeCategory::Other),
        DataTypeInfo::new("tsquery", DataTypeCategory::Other),
    ]
}

pub fn postgres_type_map() -> DialectTypeMap {
    DialectTypeMap::builder(Dialect::PostgreSql)
        .data_types(postgres_data_types())
        .canonical(TypeClass::Boolean, "boolean")
        .canonical(TypeClass::TinyInteger, "smallint")
        .canonical(TypeClass::SmallInteger, "smallint")
        .canonical(TypeClass::Integer, "integer")
        .canonical(TypeClass::BigInteger, "bigint")
        .canonical(TypeClass::Real, "real")
        .canonical(TypeClass::Double, "double precision")
        .canonical(TypeClass::Decimal, "numeric")
        .canonical(TypeClass::Text, "varchar")
        .canonical(TypeClass::FixedText, "char")
        .canonical(TypeClass::Binary, "bytea")
        .canonical(TypeClass::Guid, "uuid")
        .canonical(TypeClass::Date, "date")
        .canonical(TypeClass::Time, "time")
        .canonical(TypeClass::DateTime, "timestamp")
        .canonical(TypeClass::DateTimeOffset, "timestamptz")
        .canonical(TypeClass::Interval, "interval")
        .canonical(TypeClass::Json, "jsonb")
        .unlimited(TypeClass::Text, "text")
        .unlimited(TypeClass::FixedText, "text")
        // unsigned values need the next wider signed type
        .exact(HostType::U16, |_, _| Some("integer".into()))
        .exact(HostType::U32, |_, _| Some("bigint".into()))
        .exact(HostType::U64, |_, _| Some("numeric(20,0)".into()))
        .composite_fallback(|host, map, settings| match host {
            HostType::List(element) if !element.is_composite() => {
                let element = map
                    .resolve_with(&HostTypeDescriptor::new((**element).clone()), settings)
                    .ok()?;
                Some(format!("{}[]", element))
            }
            HostType::List(_) | HostType::Map(_, _) | HostType::Object(_) => {
                Some("jsonb".to_string())
            }
            _ => None,
        })
        .reverse_hook(|parsed| {
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
    use schemata_core::TypeFamily;
    use schemata_core::typemap::TypeMappingSettings;

    fn resolve(descriptor: HostTypeDescriptor) -> String {
        postgres_type_map()
            .resolve_with(&descriptor, &TypeMappingSettings::default())
            .unwrap()
    }

    #[test]
    fn unsigned_types_widen() {
        assert_eq!(resolve(HostType::U8.into()), "smallint");
        assert_eq!(resolve(HostType::U16.into()), "integer");
        assert_eq!(resolve(HostType::U32.into()), "bigint");
        assert_eq!(resolve(HostType::U64.into()), "numeric(20,0)");
        assert_eq!(resolve(HostType::I8.into()), "smallint");
    }

    #[test]
    fn strings_size_or_fall_back_to_text() {
        assert_eq!(resolve(HostType::String.into()), "text");
        assert_eq!(
            resolve(HostTypeDescriptor::new(HostType::String).with_length(100)),
            "varchar(100)"
        );
        assert_eq!(
            resolve(HostTypeDescriptor::new(HostType::String).with_length(20_000_000)),
            "text"
        );
        assert_eq!(resolve(HostType::Char.into()), "char(1)");
    }

    #[test]
    fn decimals_follow_the_defaults() {
        assert_eq!(resolve(HostType::Decimal.into()), "numeric(16,4)");
        assert_eq!(
            resolve(HostTypeDescriptor::new(HostType::Decimal).with_precision(10, Some(2))),
            "numeric(10,2)"
        );
    }

    #[test]
    fn lists_become_arrays_and_objects_jsonb() {
        assert_eq!(resolve(HostType::List(Box::new(HostType::I32)).into()), "integer[]");
        assert_eq!(
            resolve(HostType::List(Box::new(HostType::Object("Tag".into()))).into()),
            "jsonb"
        );
        assert_eq!(
            resolve(HostType::Map(Box::new(HostType::String), Box::new(HostType::I64)).into()),
            "jsonb"
        );
        assert_eq!(resolve(HostType::Duration.into()), "interval");
        assert_eq!(resolve(HostType::Uuid.into()), "uuid");
    }

    #[test]
    fn catalog_spellings_reverse() {
        let map = postgres_type_map();
        let varchar = map.reverse("character varying(100)").unwrap();
        assert_eq!(varchar.host_type(), &HostType::String);
        assert_eq!(varchar.length, Some(100));

        let stamp = map.reverse("timestamp(3) with time zone").unwrap();
        assert_eq!(stamp.host_type(), &HostType::DateTimeOffset);

        let serial = map.reverse("serial").unwrap();
        assert_eq!(serial.host_type(), &HostType::I32);
        assert_eq!(serial.is_auto_increment, Some(true));

        let array = map.reverse("integer[]").unwrap();
        assert_eq!(array.host_type(), &HostType::List(Box::new(HostType::I32)));

        assert_eq!(map.reverse("numeric(20,0)").unwrap().host_type(), &HostType::U64);
        assert_eq!(map.reverse("inet").unwrap().host_type().family(), TypeFamily::Text);
    }

    #[test]
    fn only_whole_twenty_digit_decimals_share_the_u64_spelling() {
        let map = postgres_type_map();
        let whole = resolve(HostTypeDescriptor::new(HostType::Decimal).with_precision(20, Some(0)));
        assert_eq!(whole, "numeric(20,0)");
        assert_eq!(map.reverse(&whole).unwrap().host_type(), &HostType::U64);

        for declared in ["numeric(20,2)", "numeric(19,0)", "numeric"] {
            assert_eq!(
                map.reverse(declared).unwrap().host_type(),
                &HostType::Decimal,
                "{}",
                declared
            );
        }
    }

    #[test]
    fn every_scalar_round_trips_within_its_family() {
        let map = postgres_type_map();
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
