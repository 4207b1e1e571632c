//! Streaming `multipart/form-data` bodies.
//!
//! The body is produced as three pieces: a preamble holding every text part
//! and the file part's headers, the file contents read from disk in chunks,
//! and the closing boundary. The total length is known before the first
//! byte is sent.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::{future, stream, StreamExt};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::transport::ByteStream;

const CRLF: &str = "\r\n";

#[derive(Debug, Clone)]
struct FilePart {
    field: String,
    file_name: String,
    path: PathBuf,
    length: u64,
}

/// A multipart body with text fields and at most one file.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    fields: Vec<(String, String)>,
    file: Option<FilePart>,
}

impl MultipartForm {
    /// An empty form with a random boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::with_boundary(format!("opcall-{}", Uuid::new_v4().simple()))
    }

    /// An empty form with a fixed boundary.
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            fields: Vec::new(),
            file: None,
        }
    }

    /// Appends a text part.
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Attaches the file at `path` under `field`, replacing any earlier file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file's metadata cannot be read or it is not a
    /// regular file.
    pub async fn file(mut self, field: impl Into<String>, path: &Path) -> io::Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
        self.file = Some(FilePart {
            field: field.into(),
            file_name,
            path: path.to_path_buf(),
            length: metadata.len(),
        });
        Ok(self)
    }

    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Exact size of the serialized body in bytes.
    #[must_use]
    pub fn content_length(&self) -> u64 {
        let file_len = self.file.as_ref().map_or(0, |f| f.length);
        self.preamble().len() as u64 + file_len + self.epilogue().len() as u64
    }

    fn preamble(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.fields {
            out.push_str(&format!("--{}{CRLF}", self.boundary));
            out.push_str(&format!(
                "Content-Disposition: form-data; name=\"{}\"{CRLF}{CRLF}",
                escape(name)
            ));
            out.push_str(value);
            out.push_str(CRLF);
        }
        if let Some(file) = &self.file {
            out.push_str(&format!("--{}{CRLF}", self.boundary));
            out.push_str(&format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"{CRLF}",
                escape(&file.field),
                escape(&file.file_name)
            ));
            out.push_str(&format!("Content-Type: application/octet-stream{CRLF}{CRLF}"));
        }
        out
    }

    fn epilogue(&self) -> String {
        if self.file.is_some() {
            format!("{CRLF}--{}--{CRLF}", self.boundary)
        } else {
            format!("--{}--{CRLF}", self.boundary)
        }
    }

    /// Opens the file and returns the body as a chunk stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub async fn into_stream(self) -> io::Result<ByteStream> {
        let head = stream::once(future::ready(Ok::<_, io::Error>(Bytes::from(self.preamble()))));
        let tail = stream::once(future::ready(Ok::<_, io::Error>(Bytes::from(self.epilogue()))));

        match self.file {
            Some(file) => {
                let reader = tokio::fs::File::open(&file.path).await?;
                Ok(head.chain(ReaderStream::new(reader)).chain(tail).boxed())
            }
            None => Ok(head.chain(tail).boxed()),
        }
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

/// Percent-escapes the characters that would break a quoted header value.
fn escape(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
