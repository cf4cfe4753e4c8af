//! Corpus loading
//!
//! Layout on disk:
//!
//! ```text
//! <dir>/manifest.json
//! <dir>/<document id>/merged.txt
//! ```
//!
//! Documents are loaded once at startup and shared read-only by every query.

use crate::interface::{ConcordError, ConcordResult};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TEXT_FILE_NAME: &str = "merged.txt";
const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Where a document's text lives
#[derive(Debug, Clone)]
pub enum DocumentText {
    Loaded(Arc<str>),
    /// Read from disk on every scan
    Lazy(PathBuf),
}

/// Immutable corpus entry
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    text: DocumentText,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<Arc<str>>) -> Self {
        Self {
            id: id.into(),
            text: DocumentText::Loaded(text.into()),
        }
    }

    pub fn lazy(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            text: DocumentText::Lazy(path.into()),
        }
    }

    pub fn source(&self) -> &DocumentText {
        &self.text
    }

    /// The document text. Only lazy documents can fail.
    pub fn text(&self) -> ConcordResult<Cow<'_, str>> {
        match &self.text {
            DocumentText::Loaded(text) => Ok(Cow::Borrowed(text)),
            DocumentText::Lazy(path) => {
                let bytes = fs::read(path).map_err(|e| ConcordError::io(path, e))?;
                Ok(Cow::Owned(into_text(bytes, path)))
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Keep only paths and read each text when it is scanned
    pub lazy: bool,
    /// Stop after this many documents
    pub limit: Option<usize>,
}

/// The fixed document set searched by every query, plus the raw manifest payload
#[derive(Debug, Default)]
pub struct Corpus {
    documents: Vec<Document>,
    manifest: Vec<u8>,
}

impl Corpus {
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self {
            documents,
            manifest: b"[]".to_vec(),
        }
    }

    pub fn with_manifest(mut self, manifest: Vec<u8>) -> Self {
        self.manifest = manifest;
        self
    }

    /// Load every `<dir>/<id>/merged.txt`, in directory-name order.
    ///
    /// Unreadable texts are skipped with a warning. A missing manifest or an
    /// unreadable directory is fatal.
    pub fn load(dir: impl AsRef<Path>, options: &LoadOptions) -> ConcordResult<Self> {
        let dir = dir.as_ref();
        let mut entries: Vec<fs::DirEntry> = fs::read_dir(dir)
            .map_err(|e| ConcordError::io(dir, e))?
            .collect::<Result<_, _>>()
            .map_err(|e| ConcordError::io(dir, e))?;
        entries.sort_by_key(|entry| entry.file_name());

        let mut documents = Vec::new();
        for entry in entries {
            if options.limit.is_some_and(|limit| documents.len() >= limit) {
                break;
            }

            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }

            let id = entry.file_name().to_string_lossy().into_owned();
            let text_path = entry.path().join(TEXT_FILE_NAME);
            if options.lazy {
                documents.push(Document::lazy(id, text_path));
                continue;
            }

            match fs::read(&text_path) {
                Ok(bytes) => {
                    let text = into_text(bytes, &text_path);
                    documents.push(Document::new(id, text));
                }
                Err(e) => {
                    tracing::warn!(path = %text_path.display(), error = %e, "failed to load file");
                }
            }
        }

        let manifest_path = dir.join(MANIFEST_FILE_NAME);
        let manifest = fs::read(&manifest_path).map_err(|e| {
            ConcordError::Manifest(format!("{}: {}", manifest_path.display(), e))
        })?;

        tracing::info!(
            directory = %dir.display(),
            documents = documents.len(),
            lazy = options.lazy,
            "corpus loaded"
        );

        Ok(Self {
            documents,
            manifest,
        })
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn manifest(&self) -> &[u8] {
        &self.manifest
    }
}

fn into_text(bytes: Vec<u8>, path: &Path) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path = %path.display(), "text is not valid UTF-8, replacing invalid bytes");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}
