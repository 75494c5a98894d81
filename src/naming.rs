//! Constraint identifier sanitizing and de-duplication.

use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

/// Combining diacritical marks, stripped after canonical decomposition.
const COMBINING_MARKS: std::ops::RangeInclusive<char> = '\u{0300}'..='\u{036f}';

const LAST_RESORT: &str = "constraint";

/// Name used when a schema or table name is blank.
const UNNAMED: &str = "unnamed";

/// Lower snake case restricted to `[a-z0-9_]`, accents folded away.
pub fn to_snake_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_sep = false;

    for c in value.nfd().filter(|c| !COMBINING_MARKS.contains(c)) {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

fn ensure_prefix(value: String) -> String {
    match value.chars().next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => value,
        _ => format!("c_{}", value),
    }
}

/// Sanitize a constraint name, falling back to `fallback` (and then to
/// `constraint`) when nothing usable is left.
pub fn sanitize(raw: &str, fallback: &str) -> String {
    let primary = to_snake_case(raw);
    if !primary.is_empty() {
        return ensure_prefix(primary);
    }
    let fallback = to_snake_case(fallback);
    if fallback.is_empty() {
        ensure_prefix(LAST_RESORT.to_string())
    } else {
        ensure_prefix(fallback)
    }
}

/// `base` if unused, else the first free `base_2`, `base_3`, ...
pub fn ensure_unique<I, S>(base: &str, existing: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let used: HashSet<String> = existing
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect();
    next_free(base, &used)
}

/// Like [`ensure_unique`] for schema and table names: trims, and substitutes
/// a placeholder for blank input.
pub fn ensure_unique_name<I, S>(base: &str, existing: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let trimmed = base.trim();
    let base = if trimmed.is_empty() { UNNAMED } else { trimmed };
    ensure_unique(base, existing)
}

fn next_free(base: &str, used: &HashSet<String>) -> String {
    if !used.contains(base) {
        return base.to_string();
    }
    let mut counter = 2;
    loop {
        let candidate = format!("{}_{}", base, counter);
        if !used.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Join the non-empty parts with `_` and sanitize the result.
pub fn build_constraint_name(parts: &[&str], fallback: &str) -> String {
    let raw = parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_");
    sanitize(&raw, fallback)
}
