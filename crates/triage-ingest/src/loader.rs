//! Source loaders for the reference corpus.
//!
//! Supported formats: plain text / markdown, JSON (single object, array, or
//! paginated `{pages: [...]}`), tabular text with a preferred `text` column,
//! and PDF. Per-document failures are skipped with a warning and never abort
//! a batch.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};
use walkdir::WalkDir;

use triage_core::error::{Error, Result};
use triage_core::types::{DocMeta, Document};

/// Outcome of a directory ingestion pass.
#[derive(Debug, Default)]
pub struct IngestionSummary {
    pub files_scanned: usize,
    pub files_ingested: usize,
    pub files_skipped: usize,
    pub documents_loaded: usize,
}

impl std::fmt::Display for IngestionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} files scanned, {} ingested, {} skipped, {} documents loaded",
            self.files_scanned, self.files_ingested, self.files_skipped, self.documents_loaded
        )
    }
}

/// Collapse runs of spaces and tabs; line structure is preserved so the
/// chunker can still cut on newlines.
pub fn preprocess_text(text: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();
    lines.join("\n")
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn content_error(path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::Content {
        file: source_name(path),
        reason: reason.to_string(),
    }
}

/// Load one file into documents, dispatching on its extension.
pub fn load_path(path: &Path) -> Result<Vec<Document>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let docs = match ext.as_str() {
        "txt" | "md" => load_text(path)?,
        "json" => load_json(path)?,
        "csv" => load_tabular(path, ',')?,
        "tsv" => load_tabular(path, '\t')?,
        "pdf" => load_pdf(path)?,
        other => {
            return Err(content_error(
                path,
                format!("unsupported extension '{other}'"),
            ))
        }
    };
    if docs.is_empty() {
        return Err(content_error(path, "no usable text"));
    }
    Ok(docs)
}

fn load_text(path: &Path) -> Result<Vec<Document>> {
    let raw = fs::read_to_string(path).map_err(|e| content_error(path, e))?;
    let text = preprocess_text(&raw);
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Document {
        text,
        meta: DocMeta::for_source(source_name(path)),
    }])
}

fn load_pdf(path: &Path) -> Result<Vec<Document>> {
    let raw = pdf_extract::extract_text(path).map_err(|e| content_error(path, e))?;
    let text = preprocess_text(&raw);
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Document {
        text,
        meta: DocMeta::for_source(source_name(path)),
    }])
}

/// Build a `DocMeta` from a JSON metadata object, pulling out the known
/// fields and folding the rest into `extra`.
fn meta_from_json(source: &str, obj: Option<&Value>) -> DocMeta {
    let mut meta = DocMeta::for_source(source);
    let Some(Value::Object(map)) = obj else {
        return meta;
    };
    for (k, v) in map {
        let as_text = match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match k.as_str() {
            "source" => meta.source = as_text,
            "title" => meta.title = Some(as_text),
            "section" => meta.section = Some(as_text),
            "page" => meta.page = v.as_i64().map(|p| p as i32),
            _ => {
                meta.extra.insert(k.clone(), as_text);
            }
        }
    }
    meta
}

fn doc_from_json_object(path: &Path, value: &Value) -> Option<Document> {
    let text = value.get("text").and_then(Value::as_str)?;
    if text.trim().is_empty() {
        return None;
    }
    Some(Document {
        text: preprocess_text(text),
        meta: meta_from_json(&source_name(path), value.get("metadata")),
    })
}

fn load_json(path: &Path) -> Result<Vec<Document>> {
    let raw = fs::read_to_string(path).map_err(|e| content_error(path, e))?;
    let value: Value =
        serde_json::from_str(&raw).map_err(|e| content_error(path, e))?;

    match &value {
        // Array of {text, metadata} objects.
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(|item| doc_from_json_object(path, item))
            .collect()),
        // Paginated document: every page is its own chunking candidate.
        Value::Object(map) if map.contains_key("pages") => {
            let pages = map
                .get("pages")
                .and_then(Value::as_array)
                .ok_or_else(|| content_error(path, "'pages' must be an array"))?;
            let mut docs = Vec::new();
            for (i, page) in pages.iter().enumerate() {
                if let Some(mut doc) = doc_from_json_object(path, page) {
                    let number = page
                        .get("page")
                        .and_then(Value::as_i64)
                        .map(|p| p as i32)
                        .unwrap_or(i as i32 + 1);
                    doc.meta.page = Some(number);
                    docs.push(doc);
                }
            }
            Ok(docs)
        }
        // Single {text, metadata} object.
        Value::Object(_) => Ok(doc_from_json_object(path, &value).into_iter().collect()),
        _ => Err(content_error(path, "expected a JSON object or array")),
    }
}

/// Tabular text: header row, preferred `text` column, remaining columns
/// folded into metadata. Plain `split` parsing; quoted delimiters inside
/// fields are not supported.
fn load_tabular(path: &Path, delimiter: char) -> Result<Vec<Document>> {
    let raw = fs::read_to_string(path).map_err(|e| content_error(path, e))?;
    let mut lines = raw.lines().filter(|l| !l.trim().is_empty());
    let header: Vec<String> = lines
        .next()
        .ok_or_else(|| content_error(path, "empty table"))?
        .split(delimiter)
        .map(|h| h.trim().to_string())
        .collect();
    let text_col = header
        .iter()
        .position(|h| h.eq_ignore_ascii_case("text"))
        .unwrap_or(0);

    let source = source_name(path);
    let mut docs = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
        let Some(text) = fields.get(text_col) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        let mut extra = HashMap::new();
        for (i, field) in fields.iter().enumerate() {
            if i != text_col && !field.is_empty() {
                if let Some(name) = header.get(i) {
                    extra.insert(name.clone(), (*field).to_string());
                }
            }
        }
        let mut meta = DocMeta::for_source(source.clone());
        meta.extra = extra;
        docs.push(Document {
            text: preprocess_text(text),
            meta,
        });
    }
    Ok(docs)
}

const SUPPORTED: [&str; 6] = ["txt", "md", "json", "csv", "tsv", "pdf"];

/// Walk a directory and load every supported file. Unreadable or empty
/// sources are skipped and counted; the batch always completes.
pub fn load_directory(dir: &Path) -> Result<(Vec<Document>, IngestionSummary)> {
    if !dir.is_dir() {
        return Err(Error::InvalidConfig(format!(
            "not a directory: {}",
            dir.display()
        )));
    }

    let mut files: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| SUPPORTED.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    let mut summary = IngestionSummary::default();
    let mut documents = Vec::new();
    for path in &files {
        summary.files_scanned += 1;
        match load_path(path) {
            Ok(docs) => {
                summary.files_ingested += 1;
                summary.documents_loaded += docs.len();
                documents.extend(docs);
            }
            Err(err) => {
                summary.files_skipped += 1;
                warn!(file = %path.display(), %err, "skipping source document");
            }
        }
    }
    info!(%summary, dir = %dir.display(), "corpus loaded");
    Ok((documents, summary))
}
