/// Content-derived record identity.
///
/// A record's id is a pure function of its content, path, modified
/// timestamp, and tags. Re-submitting an unchanged file regenerates
/// the same ids, so upserts are idempotent and a redundant pass
/// rewrites rather than duplicates.
use std::collections::BTreeSet;

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Derive the stable id for one chunk.
pub fn derive_id(
    content: &str,
    file_path: &str,
    modified_at: Option<&str>,
    tags: &BTreeSet<String>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update(b"\0");
    hasher.update(file_path.as_bytes());
    hasher.update(b"\0");
    if let Some(ts) = modified_at {
        hasher.update(ts.as_bytes());
    }
    hasher.update(b"\0");
    for tag in tags {
        hasher.update(tag.as_bytes());
        hasher.update(b",");
    }
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}
