//! Host and dialect type descriptors
//!
//! A [`HostTypeDescriptor`] is what the application asks for; a
//! [`DialectTypeDescriptor`] is what a catalog reports. Both carry the same hint
//! set so attributes survive the trip in either direction.

use super::HostType;
use serde::{Deserialize, Serialize};

/// Length meaning "no declared limit" (`varchar(max)`, `text`, `(-1)` in catalogs).
pub const UNLIMITED: i32 = i32::MAX;

/// A host type plus the sizing hints the application attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostTypeDescriptor {
    host_type: HostType,
    pub length: Option<i32>,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
    pub is_auto_increment: Option<bool>,
    pub is_unicode: Option<bool>,
    pub is_fixed_length: Option<bool>,
}

impl HostTypeDescriptor {
    /// Nullable wrappers are removed; nullability is a column property.
    pub fn new(host_type: HostType) -> Self {
        Self {
            host_type: host_type.into_non_nullable(),
            length: None,
            precision: None,
            scale: None,
            is_auto_increment: None,
            is_unicode: None,
            is_fixed_length: None,
        }
    }

    pub fn host_type(&self) -> &HostType {
        &self.host_type
    }

    pub fn with_length(mut self, length: i32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_precision(mut self, precision: i32, scale: Option<i32>) -> Self {
        self.precision = Some(precision);
        self.scale = scale;
        self
    }

    pub fn unicode(mut self, unicode: bool) -> Self {
        self.is_unicode = Some(unicode);
        self
    }

    pub fn fixed_length(mut self, fixed: bool) -> Self {
        self.is_fixed_length = Some(fixed);
        self
    }

    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.is_auto_increment = Some(auto_increment);
        self
    }

    pub fn is_unlimited(&self) -> bool {
        self.length == Some(UNLIMITED)
    }
}

impl From<HostType> for HostTypeDescriptor {
    fn from(host_type: HostType) -> Self {
        Self::new(host_type)
    }
}

/// A catalog type string decomposed into base name and hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialectTypeDescriptor {
    /// Lower-cased, parentheses and array suffix stripped, whitespace collapsed
    pub base_type_name: String,
    /// As the catalog returned it
    pub raw_type_name: String,
    pub length: Option<i32>,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
    pub is_auto_increment: Option<bool>,
    pub is_unicode: Option<bool>,
    pub is_fixed_length: Option<bool>,
    pub is_array: bool,
}

const FIXED_WIDTH_CHAR_TYPES: &[&str] = &[
    "char",
    "nchar",
    "character",
    "bpchar",
    "national char",
    "national character",
];

impl DialectTypeDescriptor {
    /// Decompose a raw type string such as `decimal(10,2)`, `NVARCHAR(MAX)` or
    /// `character varying(255)[]`.
    pub fn parse(raw: &str) -> Self {
        let (outside, inside) = split_parenthetical(raw);

        let mut base = outside
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let mut is_array = false;
        while let Some(stripped) = base.strip_suffix("[]") {
            base = stripped.trim_end().to_string();
            is_array = true;
        }

        let numbers: Vec<i32> = inside
            .map(|group| group.split(',').filter_map(parse_size_token).collect())
            .unwrap_or_default();

        let is_sized_by_length =
            base.contains("char") || base.contains("text") || base.contains("binary");

        let (length, precision, scale) = if is_sized_by_length {
            (numbers.first().copied(), None, None)
        } else {
            (None, numbers.first().copied(), numbers.get(1).copied())
        };

        let is_fixed_length = if FIXED_WIDTH_CHAR_TYPES.contains(&base.as_str()) {
            Some(true)
        } else if base.contains("char") {
            Some(false)
        } else {
            None
        };

        let is_wide = base.starts_with("national")
            || (base.starts_with('n') && (base.contains("char") || base.contains("text")));

        Self {
            is_auto_increment: base.contains("serial").then_some(true),
            is_unicode: is_wide.then_some(true),
            base_type_name: base,
            raw_type_name: raw.to_string(),
            length,
            precision,
            scale,
            is_fixed_length,
            is_array,
        }
    }

    /// Whether the base name ends with the MySQL `unsigned` modifier.
    pub fn is_unsigned(&self) -> bool {
        self.base_type_name
            .split_whitespace()
            .any(|word| word == "unsigned")
    }

    /// `numeric(p,0)` or `decimal(p)`: a whole-number decimal of exactly
    /// `precision` digits.
    pub fn is_whole_numeric(&self, precision: i32) -> bool {
        matches!(self.base_type_name.as_str(), "numeric" | "decimal")
            && self.precision == Some(precision)
            && self.scale.unwrap_or(0) == 0
    }

    /// Base name without trailing modifiers such as `unsigned` or `zerofill`.
    pub fn base_without_modifiers(&self) -> &str {
        let mut base = self.base_type_name.as_str();
        for modifier in [" zerofill", " unsigned", " signed"] {
            base = base.strip_suffix(modifier).unwrap_or(base);
        }
        base
    }
}

/// Text outside the first parenthetical group, and the text inside it.
fn split_parenthetical(raw: &str) -> (String, Option<&str>) {
    let Some(open) = raw.find('(') else {
        return (raw.to_string(), None);
    };
    let Some(close) = raw[open..].find(')').map(|offset| open + offset) else {
        return (raw[..open].to_string(), Some(&raw[open + 1..]));
    };
    let outside = format!("{} {}", &raw[..open], &raw[close + 1..]);
    (outside, Some(&raw[open + 1..close]))
}

fn parse_size_token(token: &str) -> Option<i32> {
    let token = token.trim();
    if token.eq_ignore_ascii_case("max") {
        return Some(UNLIMITED);
    }
    let value: i64 = token.parse().ok()?;
    if value == -1 {
        Some(UNLIMITED)
    } else {
        i32::try_from(value).ok()
    }
}

#[cfg(test)]
mod tests;
