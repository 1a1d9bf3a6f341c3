//! Resume document intake: size check, type detection and text extraction.

use std::path::Path;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file was provided")]
    MissingFile,

    #[error("File exceeds the {limit_bytes} byte upload limit")]
    TooLarge { limit_bytes: usize },

    #[error("Unsupported file type '{0}'. Upload a .txt or .pdf file.")]
    UnsupportedType(String),

    #[error("Failed to read file. Please try again.")]
    Unreadable,

    #[error("The uploaded file contains no readable text")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    PlainText,
    Pdf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub file_name: String,
    pub text: String,
}

fn detect_kind(file_name: &str, content_type: Option<&str>) -> Result<DocumentKind, UploadError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("txt" | "text" | "md") => return Ok(DocumentKind::PlainText),
        Some("pdf") => return Ok(DocumentKind::Pdf),
        Some(other) => return Err(UploadError::UnsupportedType(format!(".{other}"))),
        None => {}
    }

    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());
    match mime.as_deref() {
        Some("text/plain" | "text/markdown") => Ok(DocumentKind::PlainText),
        Some("application/pdf") => Ok(DocumentKind::Pdf),
        Some(other) => Err(UploadError::UnsupportedType(other.to_string())),
        None => Err(UploadError::UnsupportedType(file_name.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, UploadError> {
    // pdf-extract panics on some malformed documents.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => {
            warn!("PDF extraction failed: {e:?}");
            Err(UploadError::Unreadable)
        }
        Err(_) => {
            warn!("PDF extraction panicked");
            Err(UploadError::Unreadable)
        }
    }
}

/// Reads the text out of an uploaded document. CPU-bound for PDFs; call from
/// a blocking task.
pub fn extract_text(
    file_name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
    max_bytes: usize,
) -> Result<ExtractedDocument, UploadError> {
    if bytes.len() > max_bytes {
        return Err(UploadError::TooLarge {
            limit_bytes: max_bytes,
        });
    }

    let text = match detect_kind(file_name, content_type)? {
        DocumentKind::PlainText => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            std::str::from_utf8(bytes)
                .map_err(|_| UploadError::Unreadable)?
                .to_string()
        }
        DocumentKind::Pdf => extract_pdf(bytes)?,
    };

    if text.trim().is_empty() {
        return Err(UploadError::Empty);
    }

    Ok(ExtractedDocument {
        file_name: file_name.to_string(),
        text,
    })
}
