//! Host value types: the application-side half of a type mapping

use crate::TypeFamily;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Kind of value the embedding application stores in a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
    Char,
    String,
    Bytes,
    Uuid,
    Date,
    Time,
    DateTime,
    DateTimeOffset,
    Duration,
    Json,
    List(Box<HostType>),
    Map(Box<HostType>, Box<HostType>),
    /// Structured value identified by name, e.g. an application record
    Object(String),
    /// Opaque type the application registers by name
    Custom(String),
    Nullable(Box<HostType>),
}

/// Scalar classes a dialect names one canonical column type for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeClass {
    Boolean,
    TinyInteger,
    SmallInteger,
    Integer,
    BigInteger,
    Real,
    Double,
    Decimal,
    Text,
    FixedText,
    Binary,
    Guid,
    Date,
    Time,
    DateTime,
    DateTimeOffset,
    Interval,
    Json,
}

impl HostType {
    /// Strip any `Nullable` wrappers.
    pub fn non_nullable(&self) -> &HostType {
        let mut current = self;
        while let HostType::Nullable(inner) = current {
            current = inner;
        }
        current
    }

    pub fn into_non_nullable(self) -> HostType {
        match self {
            HostType::Nullable(inner) => inner.into_non_nullable(),
            other => other,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, HostType::Nullable(_))
    }

    /// Collections, object graphs and named custom types.
    pub fn is_composite(&self) -> bool {
        matches!(
            self.non_nullable(),
            HostType::List(_) | HostType::Map(_, _) | HostType::Object(_) | HostType::Custom(_)
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self.non_nullable(),
            HostType::I8
                | HostType::I16
                | HostType::I32
                | HostType::I64
                | HostType::U8
                | HostType::U16
                | HostType::U32
                | HostType::U64
        )
    }

    /// Canonical type class; composites have none.
    pub fn class(&self) -> Option<TypeClass> {
        let class = match self.non_nullable() {
            HostType::Bool => TypeClass::Boolean,
            HostType::I8 | HostType::U8 => TypeClass::TinyInteger,
            HostType::I16 | HostType::U16 => TypeClass::SmallInteger,
            HostType::I32 | HostType::U32 => TypeClass::Integer,
            HostType::I64 | HostType::U64 => TypeClass::BigInteger,
            HostType::F32 => TypeClass::Real,
            HostType::F64 => TypeClass::Double,
            HostType::Decimal => TypeClass::Decimal,
            HostType::Char => TypeClass::FixedText,
            HostType::String => TypeClass::Text,
            HostType::Bytes => TypeClass::Binary,
            HostType::Uuid => TypeClass::Guid,
            HostType::Date => TypeClass::Date,
            HostType::Time => TypeClass::Time,
            HostType::DateTime => TypeClass::DateTime,
            HostType::DateTimeOffset => TypeClass::DateTimeOffset,
            HostType::Duration => TypeClass::Interval,
            HostType::Json => TypeClass::Json,
            HostType::List(_)
            | HostType::Map(_, _)
            | HostType::Object(_)
            | HostType::Custom(_)
            | HostType::Nullable(_) => return None,
        };
        Some(class)
    }

    /// Coarse family, comparable with [`DataTypeCategory::family`].
    ///
    /// [`DataTypeCategory::family`]: crate::DataTypeCategory::family
    pub fn family(&self) -> TypeFamily {
        if self.is_integer() {
            return TypeFamily::Integer;
        }
        match self.non_nullable() {
            HostType::Bool => TypeFamily::Boolean,
            HostType::F32 | HostType::F64 | HostType::Decimal => TypeFamily::Real,
            HostType::Char | HostType::String | HostType::Uuid | HostType::Json => TypeFamily::Text,
            HostType::Bytes => TypeFamily::Binary,
            HostType::Date
            | HostType::Time
            | HostType::DateTime
            | HostType::DateTimeOffset
            | HostType::Duration => TypeFamily::DateTime,
            _ => TypeFamily::Other,
        }
    }

    /// Every scalar host type, for exhaustive mapping tests and type pickers.
    pub fn scalars() -> Vec<HostType> {
        vec![
            HostType::Bool,
            HostType::I8,
            HostType::I16,
            HostType::I32,
            HostType::I64,
            HostType::U8,
            HostType::U16,
            HostType::U32,
            HostType::U64,
            HostType::F32,
            HostType::F64,
            HostType::Decimal,
            HostType::Char,
            HostType::String,
            HostType::Bytes,
            HostType::Uuid,
            HostType::Date,
            HostType::Time,
            HostType::DateTime,
            HostType::DateTimeOffset,
            HostType::Duration,
            HostType::Json,
        ]
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostType::Bool => f.write_str("bool"),
            HostType::I8 => f.write_str("i8"),
            HostType::I16 => f.write_str("i16"),
            HostType::I32 => f.write_str("i32"),
            HostType::I64 => f.write_str("i64"),
            HostType::U8 => f.write_str("u8"),
            HostType::U16 => f.write_str("u16"),
            HostType::U32 => f.write_str("u32"),
            HostType::U64 => f.write_str("u64"),
            HostType::F32 => f.write_str("f32"),
            HostType::F64 => f.write_str("f64"),
            HostType::Decimal => f.write_str("decimal"),
            HostType::Char => f.write_str("char"),
            HostType::String => f.write_str("string"),
            HostType::Bytes => f.write_str("bytes"),
            HostType::Uuid => f.write_str("uuid"),
            HostType::Date => f.write_str("date"),
            HostType::Time => f.write_str("time"),
            HostType::DateTime => f.write_str("datetime"),
            HostType::DateTimeOffset => f.write_str("datetimeoffset"),
            HostType::Duration => f.write_str("duration"),
            HostType::Json => f.write_str("json"),
            HostType::List(inner) => write!(f, "list<{}>", inner),
            HostType::Map(key, value) => write!(f, "map<{}, {}>", key, value),
            HostType::Object(name) => write!(f, "object {}", name),
            HostType::Custom(name) => write!(f, "custom {}", name),
            HostType::Nullable(inner) => write!(f, "{}?", inner),
        }
    }
}

/// Rust types with a known host type.
///
/// Model discovery lives outside this crate; this trait is the hook it uses to
/// turn field types into [`HostType`]s.
pub trait HostTyped {
    fn host_type() -> HostType;
}

macro_rules! host_typed {
    ($($ty:ty => $host:expr),* $(,)?) => {
        $(
            impl HostTyped for $ty {
                fn host_type() -> HostType {
                    $host
                }
            }
        )*
    };
}

host_typed! {
    bool => HostType::Bool,
    i8 => HostType::I8,
    i16 => HostType::I16,
    i32 => HostType::I32,
    i64 => HostType::I64,
    u8 => HostType::U8,
    u16 => HostType::U16,
    u32 => HostType::U32,
    u64 => HostType::U64,
    f32 => HostType::F32,
    f64 => HostType::F64,
    char => HostType::Char,
    String => HostType::String,
    &str => HostType::String,
    Vec<u8> => HostType::Bytes,
    uuid::Uuid => HostType::Uuid,
    chrono::NaiveDate => HostType::Date,
    chrono::NaiveTime => HostType::Time,
    chrono::NaiveDateTime => HostType::DateTime,
    chrono::DateTime<chrono::Utc> => HostType::DateTimeOffset,
    chrono::DateTime<chrono::FixedOffset> => HostType::DateTimeOffset,
    chrono::Duration => HostType::Duration,
    std::time::Duration => HostType::Duration,
    serde_json::Value => HostType::Json,
}

impl<T: HostTyped> HostTyped for Option<T> {
    fn host_type() -> HostType {
        HostType::Nullable(Box::new(T::host_type()))
    }
}

// Vec<u8> is Bytes, so lists are spelled out per element type.
macro_rules! host_typed_list {
    ($($ty:ty),* $(,)?) => {
        $(
            impl HostTyped for Vec<$ty> {
                fn host_type() -> HostType {
                    HostType::List(Box::new(<$ty as HostTyped>::host_type()))
                }
            }
        )*
    };
}

host_typed_list!(
    bool,
    i16,
    i32,
    i64,
    f32,
    f64,
    String,
    uuid::Uuid,
    serde_json::Value
);

impl<K: HostTyped, V: HostTyped, S> HostTyped for HashMap<K, V, S> {
    fn host_type() -> HostType {
        HostType::Map(Box::new(K::host_type()), Box::new(V::host_type()))
    }
}

impl<K: HostTyped, V: HostTyped> HostTyped for BTreeMap<K, V> {
    fn host_type() -> HostType {
        HostType::Map(Box::new(K::host_type()), Box::new(V::host_type()))
    }
}
