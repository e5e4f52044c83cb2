//! Tag normalisation and classification.
//!
//! Provides helpers to:
//! - canonicalise raw key/value pairs into [`Tags`];
//! - decide whether an element carries any meaningful tag; and
//! - decide whether a closed way describes an area rather than a loop.

use campusmap_core::Tags;

/// Keys describing editing history rather than the mapped object.
const IGNORED_KEYS: &[&str] = &["created_by", "fixme", "note", "source"];

/// Canonicalise raw tags: keys are trimmed and lower-cased, values trimmed,
/// empty keys dropped. When two keys collide after lower-casing the first
/// value wins.
pub(super) fn normalise_tags<'a, T>(tags: T) -> Tags
where
    T: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut collected = Tags::new();
    for (key, value) in tags {
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        collected
            .entry(key)
            .or_insert_with(|| value.trim().to_owned());
    }
    collected
}

/// Whether `tags` hold anything beyond editing metadata and `ignore`.
pub(super) fn has_meaningful_tags(tags: &Tags, ignore: &[&str]) -> bool {
    tags.keys()
        .any(|key| !IGNORED_KEYS.contains(&key.as_str()) && !ignore.contains(&key.as_str()))
}

/// Whether a closed way tagged with `tags` encloses an area.
pub(super) fn is_area(tags: &Tags) -> bool {
    match tags.get("area").map(String::as_str) {
        Some("no") => return false,
        Some("yes") => return true,
        _ => {}
    }
    matches!(
        tags.get("indoor").map(String::as_str),
        Some("room" | "area")
    ) || ["building", "amenity", "landuse", "leisure", "place"]
        .iter()
        .any(|key| tags.contains_key(*key))
}
