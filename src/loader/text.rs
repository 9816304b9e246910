/// Plain text files: the whole file is one document, no metadata.
use std::path::Path;

use super::{DocumentLoader, LoaderError, RawDocument};

pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn load(&self, path: &Path) -> Result<Vec<RawDocument>, LoaderError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![RawDocument {
            text,
            metadata: serde_json::Map::new(),
        }])
    }
}
