//! Explicit column type overrides
//!
//! A column can pin its type per dialect with a shorthand string:
//!
//! - `{mysql:decimal(10,2),pg:numeric(10,2)}` names one literal per dialect;
//! - a bare literal such as `citext` applies to every dialect.

use crate::{Dialect, Result, SchemataError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parsed form of a type override shorthand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeOverride {
    /// Same literal on every dialect
    All(String),
    PerDialect(BTreeMap<Dialect, String>),
}

impl TypeOverride {
    pub fn parse(shorthand: &str) -> Result<Self> {
        let trimmed = shorthand.trim();
        if trimmed.is_empty() {
            return Err(malformed(shorthand, "override is empty"));
        }

        let Some(body) = trimmed.strip_prefix('{') else {
            if trimmed.ends_with('}') {
                return Err(malformed(shorthand, "missing opening brace"));
            }
            return Ok(TypeOverride::All(trimmed.to_string()));
        };
        let body = body
            .strip_suffix('}')
            .ok_or_else(|| malformed(shorthand, "missing closing brace"))?;

        let mut per_dialect = BTreeMap::new();
        for entry in split_top_level(body).map_err(|reason| malformed(shorthand, reason))? {
            let (key, literal) = entry
                .split_once(':')
                .ok_or_else(|| malformed(shorthand, "entry is not dialect:type"))?;
            let literal = literal.trim();
            if literal.is_empty() {
                return Err(malformed(shorthand, "entry has an empty type"));
            }
            let dialect: Dialect = key
                .parse()
                .map_err(|_| malformed(shorthand, "entry has an empty dialect"))?;
            if per_dialect.insert(dialect, literal.to_string()).is_some() {
                return Err(malformed(shorthand, "dialect listed twice"));
            }
        }

        if per_dialect.is_empty() {
            return Err(malformed(shorthand, "no entries"));
        }
        Ok(TypeOverride::PerDialect(per_dialect))
    }

    pub fn for_dialect(&self, dialect: &Dialect) -> Option<&str> {
        match self {
            TypeOverride::All(literal) => Some(literal),
            TypeOverride::PerDialect(map) => map.get(dialect).map(String::as_str),
        }
    }
}

fn malformed(shorthand: &str, reason: &str) -> SchemataError {
    SchemataError::Configuration(format!(
        "malformed type override '{}': {}",
        shorthand, reason
    ))
}

/// Split on commas that sit outside parentheses and quotes.
fn split_top_level(body: &str) -> std::result::Result<Vec<&str>, &'static str> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0;

    for (i, ch) in body.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.checked_sub(1).ok_or("unbalanced parentheses")?;
            }
            ',' if !in_quote && depth == 0 => {
                entries.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 || in_quote {
        return Err("unbalanced parentheses or quotes");
    }
    entries.push(body[start..].trim());

    if entries.iter().any(|entry| entry.is_empty()) {
        return Err("empty entry");
    }
    Ok(entries)
}
