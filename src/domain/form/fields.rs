//! Typed multipart form fields

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bytes::Bytes;

pub const FILES_KEY: &str = "files";
pub const SPLIT_PDF_PAGE_KEY: &str = "split_pdf_page";
pub const SPLIT_PDF_ALLOW_FAILED_KEY: &str = "split_pdf_allow_failed";
pub const SPLIT_PDF_CONCURRENCY_LEVEL_KEY: &str = "split_pdf_concurrency_level";
pub const SPLIT_PDF_PAGE_RANGE_KEY: &str = "split_pdf_page_range[]";
pub const STARTING_PAGE_NUMBER_KEY: &str = "starting_page_number";
pub const SPLIT_PDF_CACHE_TMP_DATA_KEY: &str = "split_pdf_cache_tmp_data";
pub const SPLIT_PDF_CACHE_TMP_DATA_DIR_KEY: &str = "split_pdf_cache_tmp_data_dir";

/// Fields that only steer client-side splitting and never reach the server
/// on a chunk request.
pub const SPLIT_CONTROL_KEYS: [&str; 6] = [
    SPLIT_PDF_PAGE_KEY,
    SPLIT_PDF_ALLOW_FAILED_KEY,
    SPLIT_PDF_CONCURRENCY_LEVEL_KEY,
    SPLIT_PDF_PAGE_RANGE_KEY,
    SPLIT_PDF_CACHE_TMP_DATA_KEY,
    SPLIT_PDF_CACHE_TMP_DATA_DIR_KEY,
];

/// Where the bytes of a file part live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Memory(Bytes),
    Spooled(PathBuf),
}

impl FileContent {
    /// Read the content into memory; spooled files are read at send time.
    pub async fn load(&self) -> std::io::Result<Bytes> {
        match self {
            Self::Memory(bytes) => Ok(bytes.clone()),
            Self::Spooled(path) => tokio::fs::read(path).await.map(Bytes::from),
        }
    }

    pub fn spooled_path(&self) -> Option<&Path> {
        match self {
            Self::Memory(_) => None,
            Self::Spooled(path) => Some(path),
        }
    }
}

/// The `files` part of a partition request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub filename: String,
    pub content: FileContent,
}

impl FilePart {
    pub fn new(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content: FileContent::Memory(content.into()),
        }
    }

    pub fn spooled(filename: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            content: FileContent::Spooled(path.into()),
        }
    }

    /// Guessed MIME type, `application/octet-stream` when unknown
    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

/// A single form value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    List(Vec<String>),
    File(FilePart),
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FilePart> {
        match self {
            Self::File(file) => Some(file),
            _ => None,
        }
    }
}

/// Multipart form payload of a partition request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: BTreeMap<String, FormValue>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, FormValue::Text(value.into()));
        self
    }

    pub fn with_list<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.insert(key, FormValue::List(values));
        self
    }

    pub fn with_file(mut self, file: FilePart) -> Self {
        self.insert(FILES_KEY, FormValue::File(file));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FormValue) -> Option<FormValue> {
        self.fields.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<FormValue> {
        self.fields.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&FormValue> {
        self.fields.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FormValue::as_text)
    }

    pub fn file(&self) -> Option<&FilePart> {
        self.get(FILES_KEY).and_then(FormValue::as_file)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
