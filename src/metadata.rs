/// Canonical per-file metadata and the normalization that produces it.
///
/// Loaders hand over whatever raw key/value pairs a format exposes
/// (frontmatter, filesystem timestamps, sheet names). Normalization
/// reduces that to one canonical shape: validated tags, ISO-8601
/// dates, and nothing else. Anything unparsable is dropped with a
/// debug log, never an error.
use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

static INLINE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#([A-Za-z][A-Za-z0-9_-]*(?:/[A-Za-z0-9_-]+)*)").unwrap()
});

/// The metadata stored alongside every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMetadata {
    pub file_path: String,
    pub tags: BTreeSet<String>,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub modified_at_epoch: Option<i64>,
}

/// Reduce a loader's raw metadata map to `CanonicalMetadata`.
///
/// Tags come from the raw `tags` field (comma string or array) merged
/// with inline `#tag` / `#tag/subtag` markers found in the content.
/// Tags that duplicate a path segment or the filename stem are
/// removed, case-insensitively. Raw `path`/`source` keys are not
/// carried over; the caller-supplied `file_path` is authoritative.
pub fn normalize(
    raw: &serde_json::Map<String, Value>,
    content: &str,
    file_path: &str,
) -> CanonicalMetadata {
    let mut tags = BTreeSet::new();

    match raw.get("tags") {
        Some(Value::String(s)) => {
            for tag in s.split(',') {
                insert_tag(&mut tags, tag, file_path);
            }
        }
        Some(Value::Array(items)) => {
            for item in items {
                if let Value::String(s) = item {
                    insert_tag(&mut tags, s, file_path);
                }
            }
        }
        _ => {}
    }

    for capture in INLINE_TAG_RE.captures_iter(content) {
        insert_tag(&mut tags, &capture[1], file_path);
    }

    let created_at = raw.get("created").and_then(|v| normalize_date(v, file_path));
    let modified_at = raw
        .get("last_modified")
        .and_then(|v| normalize_date(v, file_path));
    // the filesystem mtime is authoritative for change detection when
    // the caller supplies it; the `last_modified` field only fills in
    let modified_at_epoch = raw
        .get("last_modified_epoch")
        .and_then(Value::as_i64)
        .or_else(|| {
            modified_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.timestamp())
        });

    CanonicalMetadata {
        file_path: file_path.to_string(),
        tags,
        created_at,
        modified_at,
        modified_at_epoch,
    }
}

/// Validate one candidate tag and insert it if it survives.
fn insert_tag(tags: &mut BTreeSet<String>, candidate: &str, file_path: &str) {
    let tag = candidate.trim();
    if tag.is_empty() || tag == "None" {
        return;
    }
    if tag.contains('\\') || tag.chars().any(char::is_whitespace) {
        debug!(tag, "dropping malformed tag");
        return;
    }
    if collides_with_path(tag, file_path) {
        debug!(tag, file_path, "dropping path-derived tag");
        return;
    }
    tags.insert(tag.to_string());
}

/// A tag collides when it equals, case-insensitively, the filename
/// stem or any path segment. Hierarchical tags like `folder/tag` are
/// compared whole, so they survive even when a segment matches.
fn collides_with_path(tag: &str, file_path: &str) -> bool {
    let lower = tag.to_lowercase();
    let path = std::path::Path::new(file_path);

    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        if stem.to_lowercase() == lower {
            return true;
        }
    }
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|s| s.to_lowercase() == lower)
    })
}

/// Normalize a raw date value to an ISO-8601 / RFC-3339 string.
///
/// Numeric values are epoch seconds. Strings are tried as RFC-3339
/// first, then a handful of permissive formats. Unparsable values are
/// dropped.
fn normalize_date(value: &Value, file_path: &str) -> Option<String> {
    match value {
        Value::Number(n) => {
            let secs = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            match Utc.timestamp_opt(secs, 0) {
                chrono::LocalResult::Single(dt) => Some(dt.to_rfc3339()),
                _ => {
                    debug!(epoch = secs, file_path, "dropping out-of-range epoch");
                    None
                }
            }
        }
        Value::String(s) => parse_date_str(s).or_else(|| {
            debug!(date = %s, file_path, "dropping unparsable date");
            None
        }),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).to_rfc3339());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().to_rfc3339());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc().to_rfc3339());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> serde_json::Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_tags_from_comma_string() {
        let meta = normalize(&raw(json!({"tags": "rust, async , "})), "", "notes/a.md");
        assert!(meta.tags.contains("rust"));
        assert!(meta.tags.contains("async"));
        assert_eq!(meta.tags.len(), 2);
    }

    #[test]
    fn test_tags_from_array() {
        let meta = normalize(&raw(json!({"tags": ["one", "two"]})), "", "notes/a.md");
        assert_eq!(meta.tags.len(), 2);
    }

    #[test]
    fn test_inline_tags_merged() {
        let meta = normalize(
            &raw(json!({"tags": "rust"})),
            "see #async and #tokio/runtime here",
            "notes/a.md",
        );
        assert!(meta.tags.contains("async"));
        assert!(meta.tags.contains("tokio/runtime"));
        assert!(meta.tags.contains("rust"));
    }

    #[test]
    fn test_path_derived_tags_removed_case_insensitively() {
        let meta = normalize(
            &raw(json!({"tags": "Projects, meeting, keep"})),
            "",
            "projects/Meeting.md",
        );
        assert!(!meta.tags.contains("Projects"));
        assert!(!meta.tags.contains("meeting"));
        assert!(meta.tags.contains("keep"));
    }

    #[test]
    fn test_hierarchical_tag_survives_segment_collision() {
        let meta = normalize(
            &raw(json!({"tags": ["projects/alpha"]})),
            "",
            "projects/alpha.md",
        );
        assert!(meta.tags.contains("projects/alpha"));
    }

    #[test]
    fn test_malformed_tags_dropped() {
        let meta = normalize(
            &raw(json!({"tags": ["has space", "has\\slash", "None", ""]})),
            "",
            "a.md",
        );
        assert!(meta.tags.is_empty());
    }

    #[test]
    fn test_numeric_epoch_date() {
        let meta = normalize(
            &raw(json!({"created": 1700000000, "last_modified": 1700000500})),
            "",
            "a.md",
        );
        assert_eq!(meta.created_at.as_deref(), Some("2023-11-14T22:13:20+00:00"));
        assert_eq!(meta.modified_at_epoch, Some(1700000500));
    }

    #[test]
    fn test_string_dates() {
        let meta = normalize(
            &raw(json!({"created": "2024-01-15", "last_modified": "2024-01-15T10:30:00Z"})),
            "",
            "a.md",
        );
        assert!(meta.created_at.as_deref().unwrap().starts_with("2024-01-15"));
        assert!(meta.modified_at.is_some());
        assert!(meta.modified_at_epoch.is_some());
    }

    #[test]
    fn test_explicit_epoch_overrides_date_field() {
        let meta = normalize(
            &raw(json!({"last_modified": "2020-01-01", "last_modified_epoch": 1700000000})),
            "",
            "a.md",
        );
        assert_eq!(meta.modified_at_epoch, Some(1700000000));
        assert!(meta.modified_at.as_deref().unwrap().starts_with("2020-01-01"));
    }

    #[test]
    fn test_garbage_date_dropped() {
        let meta = normalize(&raw(json!({"created": "not a date"})), "", "a.md");
        assert!(meta.created_at.is_none());
    }

    #[test]
    fn test_raw_path_keys_not_carried() {
        let meta = normalize(
            &raw(json!({"path": "/elsewhere/x.md", "source": "other"})),
            "",
            "real/place.md",
        );
        assert_eq!(meta.file_path, "real/place.md");
    }
}
