/// Office formats: Word documents via docx-rs, spreadsheets via
/// calamine.
///
/// `DocxLoader` flattens the paragraph/run tree into newline-joined
/// text. `SheetLoader` emits one document per worksheet with rows
/// rendered as tab-separated lines, so cell text stays searchable
/// without pretending to be a table.
use std::path::Path;

use calamine::Reader;
use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use serde_json::Value;

use super::{DocumentLoader, LoaderError, RawDocument};

pub struct DocxLoader;

impl DocumentLoader for DocxLoader {
    fn load(&self, path: &Path) -> Result<Vec<RawDocument>, LoaderError> {
        let bytes = std::fs::read(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let docx = docx_rs::read_docx(&bytes).map_err(|e| LoaderError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut text = String::new();
        for child in &docx.document.children {
            if let DocumentChild::Paragraph(paragraph) = child {
                for pc in &paragraph.children {
                    if let ParagraphChild::Run(run) = pc {
                        for rc in &run.children {
                            if let RunChild::Text(t) = rc {
                                text.push_str(&t.text);
                            }
                        }
                    }
                }
                text.push('\n');
            }
        }

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![RawDocument {
            text,
            metadata: serde_json::Map::new(),
        }])
    }
}

pub struct SheetLoader;

impl DocumentLoader for SheetLoader {
    fn load(&self, path: &Path) -> Result<Vec<RawDocument>, LoaderError> {
        let mut workbook = calamine::open_workbook_auto(path).map_err(|e| LoaderError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
        let mut documents = Vec::new();
        for name in sheet_names {
            let range = match workbook.worksheet_range(&name) {
                Ok(range) => range,
                Err(e) => {
                    return Err(LoaderError::Parse {
                        path: path.to_path_buf(),
                        reason: format!("sheet {name}: {e}"),
                    });
                }
            };

            let mut text = String::new();
            for row in range.rows() {
                let line: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
                if line.iter().all(|c| c.is_empty()) {
                    continue;
                }
                text.push_str(&line.join("\t"));
                text.push('\n');
            }
            if text.trim().is_empty() {
                continue;
            }

            let mut metadata = serde_json::Map::new();
            metadata.insert("sheet".into(), Value::from(name));
            documents.push(RawDocument { text, metadata });
        }
        Ok(documents)
    }
}
