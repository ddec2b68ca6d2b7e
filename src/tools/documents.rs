//! Uploaded-file loading and conversion.
//!
//! A file reference (URL or local path) resolves to bytes plus an extension.
//! The extension selects a [`FileKind`]; conversion to text is delegated to a
//! [`DocumentConverter`]. Unsupported extensions are skipped with a warning.

use crate::types::{AppError, ExtractionMethod, RawDocument, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
    Document,
    Text,
}

impl FileKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "png" | "jpg" | "jpeg" | "gif" | "bmp" => Some(FileKind::Image),
            "doc" | "docx" => Some(FileKind::Document),
            "txt" => Some(FileKind::Text),
            _ => None,
        }
    }

    pub fn method(&self) -> ExtractionMethod {
        match self {
            FileKind::Pdf => ExtractionMethod::Pdf,
            FileKind::Image => ExtractionMethod::Image,
            FileKind::Document => ExtractionMethod::Document,
            FileKind::Text => ExtractionMethod::PlainText,
        }
    }
}

/// Last path segment of a URL or filesystem path, without query or fragment.
pub fn file_name(reference: &str) -> &str {
    let without_query = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference)
        .trim_end_matches('/');
    without_query
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(without_query)
}

pub fn extension(reference: &str) -> Option<&str> {
    file_name(reference)
        .rsplit_once('.')
        .map(|(_, ext)| ext)
}

/// Converts file bytes of a given kind into text.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, kind: FileKind, bytes: &[u8]) -> Result<String>;
}

/// Converter handling plain text only; other kinds need an external pipeline.
pub struct PlainTextConverter;

#[async_trait]
impl DocumentConverter for PlainTextConverter {
    async fn convert(&self, kind: FileKind, bytes: &[u8]) -> Result<String> {
        match kind {
            FileKind::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
            other => Err(AppError::Extraction(format!(
                "No converter available for {:?} files",
                other
            ))),
        }
    }
}

/// Resolves uploaded-file references into documents.
pub struct FileLoader {
    client: reqwest::Client,
    converter: Arc<dyn DocumentConverter>,
}

impl FileLoader {
    pub fn new(client: reqwest::Client, converter: Arc<dyn DocumentConverter>) -> Self {
        Self { client, converter }
    }

    async fn read_bytes(&self, reference: &str) -> Result<Vec<u8>> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let response = self
                .client
                .get(reference)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| AppError::Fetch(format!("{}: {}", reference, e)))?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| AppError::Fetch(format!("{}: {}", reference, e)))?;
            Ok(bytes.to_vec())
        } else {
            tokio::fs::read(reference)
                .await
                .map_err(|e| AppError::Fetch(format!("{}: {}", reference, e)))
        }
    }

    /// Load one file. `Ok(None)` means the extension is unsupported.
    pub async fn load(&self, reference: &str) -> Result<Option<RawDocument>> {
        let Some(kind) = extension(reference).and_then(FileKind::from_extension) else {
            warn!(file = reference, "Unsupported file type, skipping");
            return Ok(None);
        };

        let bytes = self.read_bytes(reference).await?;
        let text = self.converter.convert(kind, &bytes).await?;

        Ok(Some(RawDocument::new(
            reference,
            file_name(reference),
            text,
            kind.method(),
        )))
    }

    /// Load every reference, logging and skipping failures.
    pub async fn load_all(&self, references: &[String]) -> Vec<RawDocument> {
        let mut documents = Vec::with_capacity(references.len());
        for reference in references {
            match self.load(reference).await {
                Ok(Some(doc)) => {
                    info!(file = %reference, chars = doc.len(), "Loaded uploaded file");
                    documents.push(doc);
                }
                Ok(None) => {}
                Err(e) => warn!(file = %reference, "Failed to load file: {}", e),
            }
        }
        documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[rstest]
    #[case("report.PDF", Some(FileKind::Pdf))]
    #[case("scan.jpeg", Some(FileKind::Image))]
    #[case("notes.docx", Some(FileKind::Document))]
    #[case("plain.txt", Some(FileKind::Text))]
    #[case("deck.pptx", None)]
    #[case("no_extension", None)]
    fn test_dispatch_by_extension(#[case] name: &str, #[case] expected: Option<FileKind>) {
        assert_eq!(extension(name).and_then(FileKind::from_extension), expected);
    }

    #[test]
    fn test_file_name_strips_query() {
        assert_eq!(
            file_name("https://cdn.example/uploads/q3.txt?token=abc"),
            "q3.txt"
        );
        assert_eq!(file_name("/tmp/dir/notes.txt"), "notes.txt");
    }

    #[tokio::test]
    async fn test_load_local_text_file() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "quarterly numbers look fine").unwrap();

        let loader = FileLoader::new(reqwest::Client::new(), Arc::new(PlainTextConverter));
        let path = file.path().to_string_lossy().to_string();
        let doc = loader.load(&path).await.unwrap().unwrap();

        assert_eq!(doc.content, "quarterly numbers look fine");
        assert_eq!(doc.method, ExtractionMethod::PlainText);
    }

    #[tokio::test]
    async fn test_unsupported_extension_is_skipped() {
        let loader = FileLoader::new(reqwest::Client::new(), Arc::new(PlainTextConverter));
        let docs = loader
            .load_all(&["slides.pptx".to_string(), "missing.txt".to_string()])
            .await;
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_pdf_without_converter_fails() {
        let err = PlainTextConverter
            .convert(FileKind::Pdf, b"%PDF-1.7")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
    }
}
