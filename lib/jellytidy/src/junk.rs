//! Artist entries that are import artifacts rather than real artists.

use shared::catalog::{CatalogEntry, EntryKind};

const PLACEHOLDERS: [&str; 8] = [
    "unknown",
    "unknown artist",
    "<unknown>",
    "[unknown]",
    "(unknown)",
    "n/a",
    "null",
    "undefined",
];

pub fn is_junk_artist(name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() {
        return true;
    }
    if name.chars().all(|c| c.is_numeric() || c.is_whitespace()) {
        return true;
    }
    if !name.chars().any(char::is_alphanumeric) {
        return true;
    }
    let lowered = name.to_lowercase();
    PLACEHOLDERS.contains(&lowered.as_str())
}

pub fn junk_artists(entries: &[CatalogEntry]) -> Vec<&CatalogEntry> {
    entries
        .iter()
        .filter(|e| e.kind == EntryKind::Artist && is_junk_artist(&e.name))
        .collect()
}
