/// CSV files: one document per data row, rendered as `header: value`
/// lines so column names survive into the embedded text.
use std::path::Path;

use serde_json::Value;

use super::{DocumentLoader, LoaderError, RawDocument};

pub struct CsvLoader;

impl DocumentLoader for CsvLoader {
    fn load(&self, path: &Path) -> Result<Vec<RawDocument>, LoaderError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| LoaderError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let headers = reader
            .headers()
            .map_err(|e| LoaderError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .clone();

        let mut documents = Vec::new();
        for (row_index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| LoaderError::Parse {
                path: path.to_path_buf(),
                reason: format!("row {}: {e}", row_index + 1),
            })?;

            let text: String = record
                .iter()
                .enumerate()
                .map(|(i, value)| {
                    let header = headers.get(i).unwrap_or("");
                    format!("{header}: {value}")
                })
                .collect::<Vec<_>>()
                .join("\n");
            if text.trim().is_empty() {
                continue;
            }

            let mut metadata = serde_json::Map::new();
            metadata.insert("row".into(), Value::from(row_index + 1));
            documents.push(RawDocument { text, metadata });
        }
        Ok(documents)
    }
}
