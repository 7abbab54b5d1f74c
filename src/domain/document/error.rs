//! Document validation errors

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("File is encrypted and cannot be split")]
    Encrypted,

    #[error("File does not appear to be a valid PDF: {0}")]
    Malformed(String),

    #[error("File is not a PDF")]
    NotPdf,

    #[error("PDF has no pages")]
    NoPages,
}

impl DocumentError {
    pub fn malformed(diagnostic: impl Into<String>) -> Self {
        Self::Malformed(diagnostic.into())
    }

    pub fn is_not_pdf(&self) -> bool {
        matches!(self, Self::NotPdf)
    }
}
