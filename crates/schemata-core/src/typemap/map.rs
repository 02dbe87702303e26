//! Per-dialect bidirectional type map
//!
//! Forward resolution turns a [`HostTypeDescriptor`] into a column type string.
//! The first step that produces a type wins:
//!
//! 1. explicit column override (see [`DialectTypeMap::resolve_column`]);
//! 2. exact rule registered for the host type;
//! 3. canonical type for the host type's [`TypeClass`], sized from the hints;
//! 4. composite fallback for lists, maps, objects and custom types;
//! 5. the dialect's text type at the default string length.
//!
//! Missing attributes are filled from a [`TypeMappingSettings`] snapshot taken once
//! per call. Reverse resolution decomposes a catalog string, gives the dialect hook
//! first refusal, then looks the base name up in the [`DataTypeInfo`] table.

use super::{
    DialectTypeDescriptor, HostType, HostTypeDescriptor, TypeClass, TypeMappingDefaults,
    TypeMappingSettings, UNLIMITED,
};
use crate::model::Column;
use crate::{DataTypeInfo, Dialect, Result, SchemataError};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

type ExactRule = Box<dyn Fn(&HostTypeDescriptor, &TypeMappingSettings) -> Option<String> + Send + Sync>;
type CompositeFallback =
    Box<dyn Fn(&HostType, &DialectTypeMap, &TypeMappingSettings) -> Option<String> + Send + Sync>;
type ReverseHook = Box<dyn Fn(&DialectTypeDescriptor) -> Option<HostTypeDescriptor> + Send + Sync>;

/// Type map of one dialect. Built once per driver and read-only afterwards.
pub struct DialectTypeMap {
    dialect: Dialect,
    data_types: Vec<DataTypeInfo>,
    /// Lower-cased names and aliases to positions in `data_types`
    index: HashMap<String, usize>,
    exact: HashMap<HostType, ExactRule>,
    canonical: BTreeMap<TypeClass, &'static str>,
    unlimited: BTreeMap<TypeClass, &'static str>,
    composite: Option<CompositeFallback>,
    reverse: Option<ReverseHook>,
}

impl fmt::Debug for DialectTypeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialectTypeMap")
            .field("dialect", &self.dialect)
            .field("data_types", &self.data_types.len())
            .field("exact_rules", &self.exact.len())
            .field("canonical", &self.canonical)
            .finish_non_exhaustive()
    }
}

pub struct DialectTypeMapBuilder {
    map: DialectTypeMap,
}

impl DialectTypeMapBuilder {
    pub fn data_types(mut self, data_types: Vec<DataTypeInfo>) -> Self {
        self.map.data_types = data_types;
        self
    }

    /// Canonical type for a class. A literal with parentheses is used verbatim.
    pub fn canonical(mut self, class: TypeClass, type_name: &'static str) -> Self {
        self.map.canonical.insert(class, type_name);
        self
    }

    /// Type used when a class's length is unlimited or above the canonical maximum.
    pub fn unlimited(mut self, class: TypeClass, type_name: &'static str) -> Self {
        self.map.unlimited.insert(class, type_name);
        self
    }

    pub fn exact<F>(mut self, host_type: HostType, rule: F) -> Self
    where
        F: Fn(&HostTypeDescriptor, &TypeMappingSettings) -> Option<String> + Send + Sync + 'static,
    {
        self.map.exact.insert(host_type, Box::new(rule));
        self
    }

    pub fn composite_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&HostType, &DialectTypeMap, &TypeMappingSettings) -> Option<String>
            + Send
            + Sync
            + 'static,
    {
        self.map.composite = Some(Box::new(fallback));
        self
    }

    pub fn reverse_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DialectTypeDescriptor) -> Option<HostTypeDescriptor> + Send + Sync + 'static,
    {
        self.map.reverse = Some(Box::new(hook));
        self
    }

    pub fn build(mut self) -> DialectTypeMap {
        let mut index = HashMap::new();
        for (position, info) in self.map.data_types.iter().enumerate() {
            index.entry(info.name.to_lowercase()).or_insert(position);
            for alias in &info.aliases {
                index.entry(alias.to_lowercase()).or_insert(position);
            }
        }
        self.map.index = index;
        self.map
    }
}

impl DialectTypeMap {
    pub fn builder(dialect: Dialect) -> DialectTypeMapBuilder {
        DialectTypeMapBuilder {
            map: DialectTypeMap {
                dialect,
                data_types: Vec::new(),
                index: HashMap::new(),
                exact: HashMap::new(),
                canonical: BTreeMap::new(),
                unlimited: BTreeMap::new(),
                composite: None,
                reverse: None,
            },
        }
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Every type the dialect supports.
    pub fn data_types(&self) -> &[DataTypeInfo] {
        &self.data_types
    }

    /// Look up a type by name or alias, ignoring case.
    pub fn find(&self, name: &str) -> Option<&DataTypeInfo> {
        self.index
            .get(&name.trim().to_lowercase())
            .map(|&position| &self.data_types[position])
    }

    pub fn canonical_name(&self, class: TypeClass) -> Option<&'static str> {
        self.canonical.get(&class).copied()
    }

    /// Resolve a column's type: its override for this dialect, or the host type.
    pub fn resolve_column(&self, column: &Column) -> Result<String> {
        self.resolve_column_with(column, &TypeMappingDefaults::snapshot())
    }

    pub fn resolve_column_with(
        &self,
        column: &Column,
        settings: &TypeMappingSettings,
    ) -> Result<String> {
        if let Some(literal) = column.type_override_for(&self.dialect)? {
            return Ok(literal);
        }
        let descriptor = column.host_type_descriptor().ok_or_else(|| {
            SchemataError::TypeMapping(format!(
                "column '{}' has no host type and no {} override",
                column.column_name,
                self.dialect.display_name()
            ))
        })?;
        self.resolve_with(&descriptor, settings)
    }

    /// Forward resolution against the current process-wide defaults.
    pub fn resolve(&self, descriptor: &HostTypeDescriptor) -> Result<String> {
        self.resolve_with(descriptor, &TypeMappingDefaults::snapshot())
    }

    pub fn resolve_with(
        &self,
        descriptor: &HostTypeDescriptor,
        settings: &TypeMappingSettings,
    ) -> Result<String> {
        let host_type = descriptor.host_type();

        if let Some(rule) = self.exact.get(host_type)
            && let Some(resolved) = rule(descriptor, settings)
        {
            return Ok(resolved);
        }

        if let Some(class) = host_type.class()
            && let Some(name) = self.canonical_name(class)
        {
            return Ok(self.format_canonical(class, name, descriptor, settings));
        }

        if let Some(fallback) = &self.composite
            && let Some(resolved) = fallback(host_type, self, settings)
        {
            return Ok(resolved);
        }

        if let Some(name) = self.canonical_name(TypeClass::Text) {
            let text = HostTypeDescriptor::new(HostType::String);
            return Ok(self.format_canonical(TypeClass::Text, name, &text, settings));
        }

        Err(SchemataError::TypeMapping(format!(
            "no {} column type for host type {}",
            self.dialect.display_name(),
            host_type
        )))
    }

    /// Apply length/precision/scale to a canonical type the way its
    /// [`DataTypeInfo`] allows.
    fn format_canonical(
        &self,
        class: TypeClass,
        name: &'static str,
        descriptor: &HostTypeDescriptor,
        settings: &TypeMappingSettings,
    ) -> String {
        if name.contains('(') {
            return name.to_string();
        }
        let Some(info) = self.find(name) else {
            return name.to_string();
        };

        if info.accepts_length {
            let length = match class {
                TypeClass::Text => descriptor.length.unwrap_or(settings.string_length),
                TypeClass::Binary => descriptor.length.unwrap_or(settings.binary_length),
                _ => descriptor
                    .length
                    .or(info.default_length.map(|l| l as i32))
                    .unwrap_or(1),
            };
            let over_max = info
                .max_length
                .is_some_and(|max| i64::from(length) > max as i64);
            if length == UNLIMITED || over_max {
                return match self.unlimited.get(&class) {
                    Some(unlimited) => unlimited.to_string(),
                    None if length == UNLIMITED => name.to_string(),
                    None => format!("{}({})", name, info.max_length.unwrap_or(1)),
                };
            }
            return format!("{}({})", name, length.max(1));
        }

        if info.accepts_precision {
            let precision = match (descriptor.precision, class) {
                (Some(p), _) => Some(p),
                (None, TypeClass::Decimal) => Some(settings.decimal_precision),
                (None, _) => None,
            };
            let Some(mut precision) = precision else {
                return name.to_string();
            };
            if let Some(max) = info.max_precision {
                precision = precision.min(i32::from(max));
            }
            if !info.accepts_scale {
                return format!("{}({})", name, precision);
            }
            let scale = match (descriptor.scale, class) {
                (Some(s), _) => Some(s),
                (None, TypeClass::Decimal) => Some(settings.scale_for(precision)),
                (None, _) => None,
            };
            return match scale {
                Some(scale) => format!("{}({},{})", name, precision, scale.clamp(0, precision)),
                None => format!("{}({})", name, precision),
            };
        }

        name.to_string()
    }

    /// Reverse resolution of a raw catalog type string.
    pub fn reverse(&self, raw_type: &str) -> Result<HostTypeDescriptor> {
        let parsed = DialectTypeDescriptor::parse(raw_type);
        self.reverse_descriptor(&parsed)
    }

    pub fn reverse_descriptor(&self, parsed: &DialectTypeDescriptor) -> Result<HostTypeDescriptor> {
        if let Some(hook) = &self.reverse
            && let Some(resolved) = hook(parsed)
        {
            return Ok(resolved);
        }

        let info = self
            .find(&parsed.base_type_name)
            .or_else(|| self.find(parsed.base_without_modifiers()))
            .ok_or_else(|| {
                SchemataError::TypeMapping(format!(
                    "unknown {} type '{}'",
                    self.dialect.display_name(),
                    parsed.raw_type_name.trim()
                ))
            })?;

        let host_type = if parsed.is_array {
            HostType::List(Box::new(info.preferred_host_type()))
        } else {
            info.preferred_host_type()
        };
        Ok(carry_hints(host_type, parsed, info))
    }
}

fn carry_hints(
    host_type: HostType,
    parsed: &DialectTypeDescriptor,
    info: &DataTypeInfo,
) -> HostTypeDescriptor {
    let mut descriptor = HostTypeDescriptor::new(host_type);
    descriptor.length = parsed.length;
    descriptor.precision = parsed.precision;
    descriptor.scale = parsed.scale;
    descriptor.is_auto_increment = parsed.is_auto_increment;
    descriptor.is_fixed_length = parsed.is_fixed_length;
    descriptor.is_unicode = parsed
        .is_unicode
        .or_else(|| info.is_unicode.then_some(true));
    descriptor
}

#[cfg(test)]
mod tests;
