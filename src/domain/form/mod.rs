//! Multipart form model and split parameter parsing

mod fields;
pub mod params;

pub use fields::{
    FileContent, FilePart, FormData, FormValue, FILES_KEY, SPLIT_CONTROL_KEYS,
    SPLIT_PDF_ALLOW_FAILED_KEY, SPLIT_PDF_CACHE_TMP_DATA_DIR_KEY, SPLIT_PDF_CACHE_TMP_DATA_KEY,
    SPLIT_PDF_CONCURRENCY_LEVEL_KEY, SPLIT_PDF_PAGE_KEY, SPLIT_PDF_PAGE_RANGE_KEY,
    STARTING_PAGE_NUMBER_KEY,
};
pub use params::SplitParams;
