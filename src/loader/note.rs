/// Markdown notes: YAML frontmatter plus body text.
///
/// Frontmatter keys land in the raw metadata map as-is; filesystem
/// created/modified times are added as epoch seconds when the
/// frontmatter does not provide its own. Malformed frontmatter is
/// not an error — the whole file is treated as body.
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::debug;

use super::{DocumentLoader, LoaderError, RawDocument};

pub struct NoteLoader;

impl DocumentLoader for NoteLoader {
    fn load(&self, path: &Path) -> Result<Vec<RawDocument>, LoaderError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let (frontmatter, body) = split_frontmatter(&content);
        let mut metadata = match frontmatter {
            Some(yaml) => match serde_yaml::from_str::<serde_json::Map<String, Value>>(yaml) {
                Ok(map) => map,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "ignoring malformed frontmatter");
                    serde_json::Map::new()
                }
            },
            None => serde_json::Map::new(),
        };

        if let Ok(fs_meta) = std::fs::metadata(path) {
            if !metadata.contains_key("created") {
                if let Some(epoch) = fs_meta.created().ok().and_then(to_epoch) {
                    metadata.insert("created".into(), Value::from(epoch));
                }
            }
            if !metadata.contains_key("last_modified") {
                if let Some(epoch) = fs_meta.modified().ok().and_then(to_epoch) {
                    metadata.insert("last_modified".into(), Value::from(epoch));
                }
            }
        }

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![RawDocument {
            text: body.to_string(),
            metadata,
        }])
    }
}

fn to_epoch(time: SystemTime) -> Option<i64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs() as i64)
}

/// Split `---` delimited frontmatter off the top of a note. Returns
/// `(frontmatter, body)`; no opening delimiter or no closing one
/// means the whole content is body.
fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content.strip_prefix("---\n").or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };
    for marker in ["\n---\n", "\n---\r\n"] {
        if let Some(end) = rest.find(marker) {
            return (Some(&rest[..end]), &rest[end + marker.len()..]);
        }
    }
    if let Some(fm) = rest.strip_suffix("\n---") {
        return (Some(fm), "");
    }
    (None, content)
}
