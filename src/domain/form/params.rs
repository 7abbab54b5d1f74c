//! Split parameters read from the form, with default-fallback parsing

use std::path::{Path, PathBuf};

use tracing::warn;

use super::fields::{
    FormData, FormValue, SPLIT_PDF_ALLOW_FAILED_KEY, SPLIT_PDF_CACHE_TMP_DATA_DIR_KEY,
    SPLIT_PDF_CACHE_TMP_DATA_KEY, SPLIT_PDF_CONCURRENCY_LEVEL_KEY, SPLIT_PDF_PAGE_KEY,
    SPLIT_PDF_PAGE_RANGE_KEY, STARTING_PAGE_NUMBER_KEY,
};
use crate::domain::split::SplitLimits;
use crate::domain::DomainError;

pub const DEFAULT_ALLOW_FAILED: bool = false;
pub const DEFAULT_CACHE_TMP_DATA: bool = false;

/// Everything the splitter needs to know about one partition call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitParams {
    pub starting_page_number: u32,
    pub allow_failed: bool,
    pub concurrency_level: usize,
    /// Raw requested bounds, checked against the page count by the planner
    pub page_range: Option<(i64, i64)>,
    pub cache_tmp_data: bool,
    pub cache_tmp_data_dir: PathBuf,
}

impl SplitParams {
    /// Read all split parameters. Only a malformed page range is an error;
    /// every other field falls back to its default.
    pub fn from_form(form: &FormData, limits: &SplitLimits) -> Result<Self, DomainError> {
        Ok(Self {
            starting_page_number: starting_page_number(
                form,
                STARTING_PAGE_NUMBER_KEY,
                limits.default_starting_page_number,
            ),
            allow_failed: bool_param(form, SPLIT_PDF_ALLOW_FAILED_KEY, DEFAULT_ALLOW_FAILED),
            concurrency_level: concurrency_level(
                form,
                SPLIT_PDF_CONCURRENCY_LEVEL_KEY,
                limits.default_concurrency,
                limits.max_concurrency,
            ),
            page_range: page_range(form, SPLIT_PDF_PAGE_RANGE_KEY)?,
            cache_tmp_data: bool_param(form, SPLIT_PDF_CACHE_TMP_DATA_KEY, DEFAULT_CACHE_TMP_DATA),
            cache_tmp_data_dir: cache_tmp_data_dir(
                form,
                SPLIT_PDF_CACHE_TMP_DATA_DIR_KEY,
                &std::env::temp_dir(),
            ),
        })
    }
}

/// `split_pdf_page` is on only for a literal `true`
pub fn split_pdf_page(form: &FormData) -> bool {
    form.text(SPLIT_PDF_PAGE_KEY)
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
}

pub fn starting_page_number(form: &FormData, key: &str, fallback: u32) -> u32 {
    let Some(raw) = form.text(key).map(str::trim).filter(|raw| !raw.is_empty()) else {
        return fallback;
    };

    match raw.parse::<i64>() {
        Ok(value) if value >= 1 => u32::try_from(value).unwrap_or(fallback),
        Ok(_) => {
            warn!("'{}' is less than 1. Using default value '{}'.", key, fallback);
            fallback
        }
        Err(_) => {
            warn!("'{}' is not a valid integer. Using default value '{}'.", key, fallback);
            fallback
        }
    }
}

pub fn bool_param(form: &FormData, key: &str, fallback: bool) -> bool {
    let Some(raw) = form.text(key) else {
        return fallback;
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => true,
        "false" => false,
        _ => {
            warn!("'{}' is not a valid boolean. Using default value '{}'.", key, fallback);
            fallback
        }
    }
}

pub fn concurrency_level(form: &FormData, key: &str, fallback: usize, max_allowed: usize) -> usize {
    let Some(raw) = form.text(key) else {
        return fallback;
    };

    let level = match raw.trim().parse::<i64>() {
        Ok(level) => level,
        Err(_) => {
            warn!("'{}' is not a valid integer. Using default value '{}'.", key, fallback);
            return fallback;
        }
    };

    if level < 1 {
        warn!("'{}' is less than 1. Using the default value = {}.", key, fallback);
        return fallback;
    }

    let level = usize::try_from(level).unwrap_or(max_allowed);
    if level > max_allowed {
        warn!(
            "'{}' is greater than {}. Using the maximum allowed value = {}.",
            key, max_allowed, max_allowed
        );
        return max_allowed;
    }

    level
}

/// Parse the two-element page range. Bounds are checked later against the
/// real page count.
pub fn page_range(form: &FormData, key: &str) -> Result<Option<(i64, i64)>, DomainError> {
    let values: Vec<&str> = match form.get(key) {
        None => return Ok(None),
        Some(FormValue::List(values)) => values.iter().map(String::as_str).collect(),
        Some(FormValue::Text(value)) => vec![value.as_str()],
        Some(FormValue::File(_)) => Vec::new(),
    };

    let parsed = match values.as_slice() {
        [start, end] => start
            .trim()
            .parse::<i64>()
            .ok()
            .zip(end.trim().parse::<i64>().ok()),
        _ => None,
    };

    parsed.map(Some).ok_or_else(|| {
        DomainError::validation(format!("{:?} is not a valid page range.", values))
    })
}

/// Use the requested spool directory if it exists, otherwise the fallback.
pub fn cache_tmp_data_dir(form: &FormData, key: &str, fallback: &Path) -> PathBuf {
    let Some(raw) = form.text(key).map(str::trim).filter(|raw| !raw.is_empty()) else {
        return fallback.to_path_buf();
    };

    let requested = Path::new(raw);
    if !requested.exists() {
        warn!(
            "'{}' directory '{}' does not exist. Using default value '{}'.",
            key,
            raw,
            fallback.display()
        );
        return fallback.to_path_buf();
    }

    requested
        .canonicalize()
        .unwrap_or_else(|_| requested.to_path_buf())
}
