//! PDF loading, validation and page slicing

mod error;
mod validator;

pub use error::DocumentError;
pub use validator::{has_pdf_header, PdfDocument};

#[cfg(test)]
pub mod test_support;
