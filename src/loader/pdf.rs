/// PDF extraction via lopdf, one document per page.
///
/// A page that fails text extraction is skipped with a debug log;
/// only a document that cannot be opened at all is a load error.
use std::path::Path;

use lopdf::Document;
use serde_json::Value;
use tracing::debug;

use super::{DocumentLoader, LoaderError, RawDocument};

pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<Vec<RawDocument>, LoaderError> {
        let doc = Document::load(path).map_err(|e| LoaderError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut documents = Vec::new();
        for (&page_number, _) in &doc.get_pages() {
            let text = match doc.extract_text(&[page_number]) {
                Ok(text) => text,
                Err(e) => {
                    debug!(
                        path = %path.display(),
                        page = page_number,
                        error = %e,
                        "skipping unextractable page"
                    );
                    continue;
                }
            };
            if text.trim().is_empty() {
                continue;
            }
            let mut metadata = serde_json::Map::new();
            metadata.insert("page".into(), Value::from(page_number));
            documents.push(RawDocument { text, metadata });
        }
        Ok(documents)
    }
}
