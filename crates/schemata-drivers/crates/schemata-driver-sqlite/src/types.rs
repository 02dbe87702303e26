//! SQLite type table and type map
//!
//! SQLite stores values by affinity, not declared type, but keeps the declared
//! type text verbatim. Types are declared the way other dialects spell them so
//! that reverse resolution recovers the intended host type.

use schemata_core::typemap::{DialectTypeMap, HostTypeDescriptor, TypeClass};
use schemata_core::{DataTypeCategory, DataTypeInfo, Dialect, HostType};

pub fn sqlite_data_types() -> Vec<DataTypeInfo> {
    vec![
        DataTypeInfo::new("integer", DataTypeCategory::Integer)
            .with_aliases(&["int8", "unsigned big int"])
            .maps_to(HostType::I64)
            .common()
            .with_desc("64-bit signed integer; INTEGER PRIMARY KEY aliases the rowid"),
        DataTypeInfo::new("int", DataTypeCategory::Integer)
            .with_aliases(&["mediumint", "int4"])
            .maps_to(HostType::I32),
        DataTypeInfo::new("bigint", DataTypeCategory::Integer).maps_to(HostType::I64),
        DataTypeInfo::new("smallint", DataTypeCategory::Integer)
            .with_aliases(&["int2"])
            .maps_to(HostType::I16),
        DataTypeInfo::new("tinyint", DataTypeCategory::Integer).maps_to(HostType::I8),
        DataTypeInfo::new("boolean", DataTypeCategory::Boolean)
            .with_aliases(&["bool"])
            .maps_to(HostType::Bool),
        DataTypeInfo::new("real", DataTypeCategory::Float)
            .with_aliases(&["float"])
            .maps_to(HostType::F64)
            .common(),
        DataTypeInfo::new("double", DataTypeCategory::Float)
            .with_aliases(&["double precision"])
            .maps_to(HostType::F64),
        DataTypeInfo::new("numeric", DataTypeCategory::Decimal)
            .with_aliases(&["decimal"])
            .with_precision(None, Some(38))
            .with_scale(None, Some(38)),
        DataTypeInfo::new("varchar", DataTypeCategory::String)
            .with_aliases(&["character varying", "varying character"])
            .with_length(None, None)
            .common(),
        DataTypeInfo::new("nvarchar", DataTypeCategory::String)
            .with_aliases(&["national varchar"])
            .with_length(None, None)
            .unicode(),
        DataTypeInfo::new("char", DataTypeCategory::String)
            .with_aliases(&["character"])
            .with_length(Some(1), None)
            .fixed_length(),
        DataTypeInfo::new("nchar", DataTypeCategory::String)
            .with_aliases(&["native character"])
            .with_length(Some(1), None)
            .fixed_length()
            .unicode(),
        DataTypeInfo::new("text", DataTypeCategory::String)
            .with_aliases(&["clob"])
            .common(),
        DataTypeInfo::new("blob", DataTypeCategory::Binary).common(),
        DataTypeInfo::new("date", DataTypeCategory::Date),
        DataTypeInfo::new("time", DataTypeCategory::Time),
        DataTypeInfo::new("datetime", DataTypeCategory::DateTime).with_aliases(&["timestamp"]),
        DataTypeInfo::new("datetimeoffset", DataTypeCategory::DateTime)
            .with_aliases(&["timestamptz"])
            .maps_to(HostType::DateTimeOffset),
        DataTypeInfo::new("interval", DataTypeCategory::Interval),
        DataTypeInfo::new("json", DataTypeCategory::Json),
    ]
}

pub fn sqlite_type_map() -> DialectTypeMap {
    DialectTypeMap::builder(Dialect::Sqlite)
        .data_types(sqlite_data_types())
        .canonical(TypeClass::Boolean, "boolean")
        .canonical(TypeClass::TinyInteger, "tinyint")
        .canonical(TypeClass::SmallInteger, "smallint")
        .canonical(TypeClass::Integer, "int")
        .canonical(TypeClass::BigInteger, "bigint")
        .canonical(TypeClass::Real, "real")
        .canonical(TypeClass::Double, "double")
        .canonical(TypeClass::Decimal, "numeric")
        .canonical(TypeClass::Text, "varchar")
        .canonical(TypeClass::FixedText, "char")
        .canonical(TypeClass::Binary, "blob")
        .canonical(TypeClass::Guid, "varchar(36)")
        .canonical(TypeClass::Date, "date")
        .canonical(TypeClass::Time, "time")
        .canonical(TypeClass::DateTime, "datetime")
        .canonical(TypeClass::DateTimeOffset, "datetimeoffset")
        .canonical(TypeClass::Interval, "interval")
        .canonical(TypeClass::Json, "json")
        .unlimited(TypeClass::Text, "text")
        .exact(HostType::U64, |_, _| Some("numeric(20,0)".into()))
        .exact(HostType::String, |desc, _| {
            (desc.is_unicode == Some(true) && !desc.is_unlimited()).then(|| match desc.length {
                Some(length) => format!("nvarchar({})", length.max(1)),
                None => "nvarchar".to_string(),
            })
        })
        .composite_fallback(|host, _, _| match host {
            HostType::List(_) | HostType::Map(_, _) | HostType::Object(_) => {
                Some("json".to_string())
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

/// Host type for a declared type no table entry knows, following SQLite's
/// column affinity rules.
pub fn affinity_host_type(declared: &str) -> HostTypeDescriptor {
    let upper = declared.to_ascii_uppercase();
    let host_type = if upper.contains("INT") {
        HostType::I64
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        HostType::String
    } else if upper.contains("BLOB") || upper.trim().is_empty() {
        HostType::Bytes
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        HostType::F64
    } else {
        HostType::Decimal
    };
    HostTypeDescriptor::new(host_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use schemata_core::typemap::TypeMappingSettings;

    fn resolve(descriptor: HostTypeDescriptor) -> String {
        sqlite_type_map()
            .resolve_with(&descriptor, &TypeMappingSettings::default())
            .unwrap()
    }

    #[test]
    fn strings_are_text_unless_sized() {
        assert_eq!(resolve(HostTypeDescriptor::new(HostType::String)), "text");
        assert_eq!(
            resolve(HostTypeDescriptor::new(HostType::String).with_length(100)),
            "varchar(100)"
        );
        assert_eq!(
            resolve(HostTypeDescriptor::new(HostType::String).with_length(i32::MAX)),
            "text"
        );
        assert_eq!(
            resolve(HostTypeDescriptor::new(HostType::String).with_length(40).unicode(true)),
            "nvarchar(40)"
        );
    }

    #[test]
    fn exact_and_canonical_choices() {
        assert_eq!(resolve(HostType::U64.into()), "numeric(20,0)");
        assert_eq!(resolve(HostType::Uuid.into()), "varchar(36)");
        assert_eq!(resolve(HostType::Decimal.into()), "numeric(16,4)");
        assert_eq!(resolve(HostType::List(Box::new(HostType::I32)).into()), "json");
        assert_eq!(resolve(HostType::Custom("money".into()).into()), "text");
    }

    #[test]
    fn every_scalar_round_trips_within_its_family() {
        let map = sqlite_type_map();
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

    #[test]
    fn unknown_declared_types_follow_affinity() {
        assert_eq!(affinity_host_type("UNSIGNED BIGINTEGER").host_type(), &HostType::I64);
        assert_eq!(affinity_host_type("STRINGCHAR").host_type(), &HostType::String);
        assert_eq!(affinity_host_type("").host_type(), &HostType::Bytes);
        assert_eq!(affinity_host_type("FLOATING").host_type(), &HostType::F64);
        assert_eq!(affinity_host_type("MONEY").host_type(), &HostType::Decimal);
    }
}
