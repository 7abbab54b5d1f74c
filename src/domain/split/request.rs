//! Turns a chunk into a standalone partition request

use super::chunk::Chunk;
use crate::domain::form::{
    FormData, FormValue, FILES_KEY, SPLIT_CONTROL_KEYS, SPLIT_PDF_PAGE_KEY,
    STARTING_PAGE_NUMBER_KEY,
};
use crate::domain::transport::{Headers, PartitionRequest, CONTENT_LENGTH, CONTENT_TYPE};
use crate::domain::DomainError;

/// Builds chunk requests from the caller's original request
#[derive(Debug, Clone)]
pub struct RequestMaterializer {
    url: String,
    headers: Headers,
    base_form: FormData,
    starting_page_number: u32,
}

impl RequestMaterializer {
    pub fn new(original: &PartitionRequest, starting_page_number: u32) -> Self {
        Self {
            url: original.url.clone(),
            headers: prepare_headers(&original.headers),
            base_form: prepare_form(&original.form),
            starting_page_number,
        }
    }

    pub fn materialize(&self, chunk: &Chunk) -> Result<PartitionRequest, DomainError> {
        if chunk.file.filename.trim().is_empty() {
            return Err(DomainError::validation("Filename can't be an empty string."));
        }

        let mut form = self.base_form.clone();
        form.insert(
            STARTING_PAGE_NUMBER_KEY,
            FormValue::Text((chunk.offset + self.starting_page_number).to_string()),
        );
        form.insert(FILES_KEY, FormValue::File(chunk.file.clone()));

        Ok(PartitionRequest {
            url: self.url.clone(),
            headers: self.headers.clone(),
            form,
        })
    }
}

/// Original headers minus the ones the transport recomputes for multipart
pub fn prepare_headers(headers: &Headers) -> Headers {
    let mut prepared = headers.clone();
    prepared.remove(CONTENT_TYPE);
    prepared.remove(CONTENT_LENGTH);
    prepared
}

/// Pass-through fields plus `split_pdf_page=false`, without the file
pub fn prepare_form(form: &FormData) -> FormData {
    let mut prepared = form.clone();
    prepared.remove(FILES_KEY);
    prepared.remove(STARTING_PAGE_NUMBER_KEY);
    for key in SPLIT_CONTROL_KEYS {
        prepared.remove(key);
    }
    prepared.insert(SPLIT_PDF_PAGE_KEY, FormValue::Text("false".to_string()));
    prepared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::form::{
        FilePart, SPLIT_PDF_ALLOW_FAILED_KEY, SPLIT_PDF_CONCURRENCY_LEVEL_KEY,
        SPLIT_PDF_PAGE_RANGE_KEY,
    };
    use crate::domain::split::PageRange;

    fn original() -> PartitionRequest {
        let form = FormData::new()
            .with_text("strategy", "hi_res")
            .with_list("extract_image_block_types[]", ["Image", "Table"])
            .with_text(SPLIT_PDF_PAGE_KEY, "true")
            .with_text(SPLIT_PDF_ALLOW_FAILED_KEY, "true")
            .with_text(SPLIT_PDF_CONCURRENCY_LEVEL_KEY, "4")
            .with_list(SPLIT_PDF_PAGE_RANGE_KEY, ["1", "10"])
            .with_text(STARTING_PAGE_NUMBER_KEY, "3")
            .with_file(FilePart::new("layout.pdf", vec![0u8; 4]));

        PartitionRequest::new("https://api.example.com/general/v0/general", form)
            .with_header("Content-Type", "multipart/form-data; boundary=abc")
            .with_header("Content-Length", "1234")
            .with_header("unstructured-api-key", "secret")
    }

    fn chunk(offset: u32, filename: &str) -> Chunk {
        Chunk {
            index: 1,
            range: PageRange::new(offset + 1, offset + 2),
            offset,
            file: FilePart::new(filename, vec![1u8, 2]),
        }
    }

    #[test]
    fn test_materialize_chunk_request() {
        let materializer = RequestMaterializer::new(&original(), 3);
        let request = materializer.materialize(&chunk(4, "layout.pdf")).unwrap();

        assert_eq!(request.form.text(SPLIT_PDF_PAGE_KEY), Some("false"));
        assert_eq!(request.form.text(STARTING_PAGE_NUMBER_KEY), Some("7"));
        assert_eq!(request.form.text("strategy"), Some("hi_res"));
        assert!(request.form.contains_key("extract_image_block_types[]"));
        assert!(!request.form.contains_key(SPLIT_PDF_ALLOW_FAILED_KEY));
        assert!(!request.form.contains_key(SPLIT_PDF_CONCURRENCY_LEVEL_KEY));
        assert!(!request.form.contains_key(SPLIT_PDF_PAGE_RANGE_KEY));
        assert_eq!(request.form.file().unwrap().content, chunk(4, "x").file.content);

        assert_eq!(request.headers.get(CONTENT_TYPE), None);
        assert_eq!(request.headers.get(CONTENT_LENGTH), None);
        assert_eq!(request.headers.get("unstructured-api-key"), Some("secret"));
        assert_eq!(request.url, "https://api.example.com/general/v0/general");
    }

    #[test]
    fn test_empty_filename_rejected() {
        let materializer = RequestMaterializer::new(&original(), 1);
        let err = materializer.materialize(&chunk(0, "  ")).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Filename can't be an empty string"));
    }
}
