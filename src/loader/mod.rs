/// Document loading: one trait, one implementation per format.
///
/// A loader turns a file into one or more `RawDocument`s — plain text
/// plus whatever raw metadata the format exposes. Dispatch is by
/// lowercase extension through `LoaderRegistry`; adding a format means
/// adding an implementation and one registry line.
pub mod csv;
pub mod note;
pub mod office;
pub mod pdf;
pub mod text;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Extracted text with the format's raw metadata, before
/// normalization. A file may yield several (PDF pages, sheet tabs,
/// CSV rows).
#[derive(Debug, Clone, Default)]
pub struct RawDocument {
    pub text: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Vec<RawDocument>, LoaderError>;
}

/// Maps lowercase file extensions to loaders.
pub struct LoaderRegistry {
    loaders: HashMap<String, Arc<dyn DocumentLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Registry covering every format this crate parses. The crawler
    /// allow-list may be wider; extensions without a loader are
    /// reported as unsupported at indexing time.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("txt", Arc::new(text::TextLoader));
        registry.register("md", Arc::new(note::NoteLoader));
        registry.register("pdf", Arc::new(pdf::PdfLoader));
        let docx: Arc<dyn DocumentLoader> = Arc::new(office::DocxLoader);
        registry.register("doc", docx.clone());
        registry.register("docx", docx);
        let sheets: Arc<dyn DocumentLoader> = Arc::new(office::SheetLoader);
        registry.register("xls", sheets.clone());
        registry.register("xlsx", sheets);
        registry.register("csv", Arc::new(csv::CsvLoader));
        registry
    }

    pub fn register(&mut self, extension: &str, loader: Arc<dyn DocumentLoader>) {
        self.loaders.insert(extension.to_lowercase(), loader);
    }

    pub fn get(&self, extension: &str) -> Option<&Arc<dyn DocumentLoader>> {
        self.loaders.get(&extension.to_lowercase())
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
