//! Deterministic object names and name filters
//!
//! | Object      | Template                                  |
//! |-------------|-------------------------------------------|
//! | primary key | `pk_{table}`                              |
//! | default     | `df_{table}_{column}`                     |
//! | check       | `ck_{table}_{column}` or `ck_{table}`     |
//! | unique      | `uc_{table}_{columns}`                    |
//! | foreign key | `fk_{table}_{columns}_{reftable}_{refcols}` |
//! | index       | `ix_{table}_{columns}`                    |
//!
//! Dots, spaces and quote characters become `_`. Names are cut at 63 bytes, the
//! PostgreSQL identifier limit, so the catalog stores exactly what was generated.

pub const MAX_GENERATED_NAME_LEN: usize = 63;

fn part(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '.' | ' ' | '"' | '\'' | '`' | '[' | ']' => '_',
            other => other,
        })
        .collect()
}

fn build(prefix: &str, parts: &[&str]) -> String {
    let mut name = String::from(prefix);
    for p in parts {
        name.push('_');
        name.push_str(&part(p));
    }
    if name.len() > MAX_GENERATED_NAME_LEN {
        let mut cut = MAX_GENERATED_NAME_LEN;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    name
}

pub fn primary_key(table: &str) -> String {
    build("pk", &[table])
}

pub fn default_constraint(table: &str, column: &str) -> String {
    build("df", &[table, column])
}

pub fn check_constraint(table: &str, column: Option<&str>) -> String {
    match column {
        Some(column) => build("ck", &[table, column]),
        None => build("ck", &[table]),
    }
}

pub fn unique_constraint(table: &str, columns: &[&str]) -> String {
    let mut parts = vec![table];
    parts.extend_from_slice(columns);
    build("uc", &parts)
}

pub fn foreign_key(
    table: &str,
    columns: &[&str],
    referenced_table: &str,
    referenced_columns: &[&str],
) -> String {
    let mut parts = vec![table];
    parts.extend_from_slice(columns);
    parts.push(referenced_table);
    parts.extend_from_slice(referenced_columns);
    build("fk", &parts)
}

pub fn index(table: &str, columns: &[&str]) -> String {
    let mut parts = vec![table];
    parts.extend_from_slice(columns);
    build("ix", &parts)
}

/// Case-insensitive name filter where `*` matches any run of characters.
/// `None`, the empty string and `*` match everything.
pub fn matches_filter(name: &str, filter: Option<&str>) -> bool {
    let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty() && *f != "*") else {
        return true;
    };
    let name: Vec<char> = name.to_lowercase().chars().collect();
    let pattern: Vec<char> = filter.to_lowercase().chars().collect();

    // greedy wildcard match with backtracking to the last '*'
    let (mut n, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while n < name.len() {
        if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, n));
            p += 1;
        } else if p < pattern.len() && pattern[p] == name[n] {
            n += 1;
            p += 1;
        } else if let Some((star_p, star_n)) = star {
            p = star_p + 1;
            n = star_n + 1;
            star = Some((star_p, star_n + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}
