//! Split planning: page range resolution and chunk sizing

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::domain::DomainError;

pub const DEFAULT_CONCURRENCY_LEVEL: usize = 8;
pub const MAX_CONCURRENCY_LEVEL: usize = 15;
pub const MIN_PAGES_PER_SPLIT: u32 = 2;
pub const MAX_PAGES_PER_SPLIT: u32 = 20;
pub const DEFAULT_STARTING_PAGE_NUMBER: u32 = 1;

/// Tunable bounds of the splitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitLimits {
    pub default_concurrency: usize,
    pub max_concurrency: usize,
    pub min_pages_per_split: u32,
    pub max_pages_per_split: u32,
    pub default_starting_page_number: u32,
}

impl Default for SplitLimits {
    fn default() -> Self {
        Self {
            default_concurrency: DEFAULT_CONCURRENCY_LEVEL,
            max_concurrency: MAX_CONCURRENCY_LEVEL,
            min_pages_per_split: MIN_PAGES_PER_SPLIT,
            max_pages_per_split: MAX_PAGES_PER_SPLIT,
            default_starting_page_number: DEFAULT_STARTING_PAGE_NUMBER,
        }
    }
}

impl SplitLimits {
    pub fn with_pages_per_split(mut self, min: u32, max: u32) -> Self {
        self.min_pages_per_split = min;
        self.max_pages_per_split = max;
        self
    }

    /// Check `1 <= min <= max` pages per split, `1 <= default <= max`
    /// concurrency and a starting page of at least 1.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.min_pages_per_split == 0 || self.min_pages_per_split > self.max_pages_per_split {
            return Err(DomainError::configuration(format!(
                "Pages per split must satisfy 1 <= min <= max, got min {} and max {}",
                self.min_pages_per_split, self.max_pages_per_split
            )));
        }

        if self.default_concurrency == 0 || self.default_concurrency > self.max_concurrency {
            return Err(DomainError::configuration(format!(
                "Concurrency must satisfy 1 <= default <= max, got default {} and max {}",
                self.default_concurrency, self.max_concurrency
            )));
        }

        if self.default_starting_page_number == 0 {
            return Err(DomainError::configuration(
                "Default starting page number must be at least 1",
            ));
        }

        Ok(())
    }

    /// Balance `num_pages` over `concurrency_level` workers, clamped to the
    /// per-split page bounds.
    pub fn optimal_split_size(&self, num_pages: u32, concurrency_level: usize) -> u32 {
        let workers = concurrency_level.max(1) as u64;
        let num_pages = num_pages as u64;
        let max_pages = self.max_pages_per_split as u64;

        let split_size = if num_pages < max_pages * workers {
            num_pages.div_ceil(workers)
        } else {
            max_pages
        };

        // max/min rather than clamp: unvalidated bounds must not panic
        (split_size as u32)
            .max(self.min_pages_per_split)
            .min(self.max_pages_per_split)
            .max(1)
    }
}

/// Inclusive, 1-indexed page range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn page_count(&self) -> u32 {
        self.end - self.start + 1
    }
}

impl std::fmt::Display for PageRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Check a requested range against the document; absent means the whole
/// document.
pub fn resolve_page_range(
    requested: Option<(i64, i64)>,
    total_pages: u32,
) -> Result<PageRange, DomainError> {
    let Some((start, end)) = requested else {
        return Ok(PageRange::new(1, total_pages));
    };

    let max = total_pages as i64;
    let in_bounds = |page: i64| (1..=max).contains(&page);

    if !in_bounds(start) || !in_bounds(end) {
        let message = format!(
            "Page range ({}, {}) is out of bounds. Start and end values should be between 1 and {}.",
            start, end, total_pages
        );
        error!("{}", message);
        return Err(DomainError::validation(message));
    }

    if start > end {
        let message = format!(
            "Page range ({}, {}) is backwards. Start must not be greater than end.",
            start, end
        );
        error!("{}", message);
        return Err(DomainError::validation(message));
    }

    Ok(PageRange::new(start as u32, end as u32))
}

/// Outcome of planning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitDecision {
    /// One chunk would be the whole document; send it as is
    NoSplit { page_count: u32 },
    Split(SplitPlan),
}

/// How a page range is cut into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPlan {
    pub range: PageRange,
    pub split_size: u32,
}

impl SplitPlan {
    pub fn new(
        range: PageRange,
        total_pages: u32,
        concurrency_level: usize,
        limits: &SplitLimits,
    ) -> SplitDecision {
        let page_count = range.page_count();
        let split_size = limits.optimal_split_size(page_count, concurrency_level);

        if split_size >= page_count && page_count == total_pages {
            return SplitDecision::NoSplit { page_count };
        }

        SplitDecision::Split(Self { range, split_size })
    }

    pub fn page_count(&self) -> u32 {
        self.range.page_count()
    }

    pub fn full_chunks(&self) -> u32 {
        self.page_count() / self.split_size
    }

    pub fn remainder(&self) -> u32 {
        self.page_count() % self.split_size
    }

    pub fn chunk_count(&self) -> usize {
        (self.full_chunks() + u32::from(self.remainder() > 0)) as usize
    }

    /// Contiguous chunk ranges in page order
    pub fn chunk_ranges(&self) -> Vec<PageRange> {
        let step = self.split_size as usize;
        (self.range.start..=self.range.end)
            .step_by(step)
            .map(|start| PageRange::new(start, (start + self.split_size - 1).min(self.range.end)))
            .collect()
    }

    pub fn log_summary(&self) {
        info!(
            "Partitioning {} files with {} page(s) each.",
            self.full_chunks(),
            self.split_size
        );

        if self.remainder() > 0 {
            info!("Partitioning 1 file with {} page(s).", self.remainder());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimal_split_size() {
        let limits = SplitLimits::default();
        let cases = [
            ((5, 3), 2),
            ((100, 3), 20),
            ((1, 5), 2),
            ((60, 4), 15),
            ((3, 10), 2),
            ((400, 15), 20),
            ((16, 8), 2),
        ];

        for ((pages, concurrency), expected) in cases {
            assert_eq!(
                limits.optimal_split_size(pages, concurrency),
                expected,
                "pages={} concurrency={}",
                pages,
                concurrency
            );
        }
    }

    #[test]
    fn test_split_size_always_within_bounds() {
        let limits = SplitLimits::default();
        for pages in 1..=300 {
            for concurrency in 1..=MAX_CONCURRENCY_LEVEL {
                let size = limits.optimal_split_size(pages, concurrency);
                assert!((MIN_PAGES_PER_SPLIT..=MAX_PAGES_PER_SPLIT).contains(&size));
            }
        }
    }

    #[test]
    fn test_validate_limits() {
        assert!(SplitLimits::default().validate().is_ok());
        assert!(SplitLimits::default().with_pages_per_split(3, 3).validate().is_ok());

        let inverted = SplitLimits::default().with_pages_per_split(5, 3);
        let err = inverted.validate().unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
        assert!(err.to_string().contains("min 5 and max 3"));

        assert!(SplitLimits::default().with_pages_per_split(0, 0).validate().is_err());

        let limits = SplitLimits {
            default_concurrency: 16,
            ..SplitLimits::default()
        };
        assert!(limits.validate().is_err());

        let limits = SplitLimits {
            default_concurrency: 0,
            ..SplitLimits::default()
        };
        assert!(limits.validate().is_err());

        let limits = SplitLimits {
            default_starting_page_number: 0,
            ..SplitLimits::default()
        };
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_inconsistent_limits_never_yield_zero_split_size() {
        assert_eq!(
            SplitLimits::default().with_pages_per_split(5, 3).optimal_split_size(10, 2),
            3
        );

        let zero = SplitLimits::default().with_pages_per_split(0, 0);
        assert_eq!(zero.optimal_split_size(10, 2), 1);
        match SplitPlan::new(PageRange::new(1, 4), 4, 2, &zero) {
            SplitDecision::Split(plan) => assert_eq!(plan.chunk_count(), 4),
            other => panic!("expected a split, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_page_range() {
        assert_eq!(resolve_page_range(Some((1, 14)), 16).unwrap(), PageRange::new(1, 14));
        assert_eq!(resolve_page_range(None, 16).unwrap(), PageRange::new(1, 16));
        assert_eq!(resolve_page_range(Some((3, 3)), 5).unwrap(), PageRange::new(3, 3));
    }

    #[test]
    fn test_resolve_page_range_rejections() {
        let backwards = resolve_page_range(Some((10, 2)), 20).unwrap_err();
        assert!(backwards.to_string().contains("backwards"));

        let negative = resolve_page_range(Some((-50, 5)), 20).unwrap_err();
        assert!(negative.to_string().contains("is out of bounds"));

        let too_far = resolve_page_range(Some((2, 100)), 20).unwrap_err();
        assert!(too_far.to_string().contains("is out of bounds"));
        assert!(too_far.is_validation());
    }

    #[test]
    fn test_no_split_for_small_document() {
        let limits = SplitLimits::default();
        let decision = SplitPlan::new(PageRange::new(1, 2), 2, 8, &limits);
        assert_eq!(decision, SplitDecision::NoSplit { page_count: 2 });
    }

    #[test]
    fn test_sub_range_always_splits() {
        let limits = SplitLimits::default();
        let decision = SplitPlan::new(PageRange::new(2, 3), 10, 8, &limits);

        let SplitDecision::Split(plan) = decision else {
            panic!("expected a split");
        };
        assert_eq!(plan.chunk_ranges(), vec![PageRange::new(2, 3)]);
    }

    #[test]
    fn test_chunk_ranges_cover_range_contiguously() {
        let limits = SplitLimits::default();
        let SplitDecision::Split(plan) = SplitPlan::new(PageRange::new(3, 19), 20, 4, &limits)
        else {
            panic!("expected a split");
        };

        assert_eq!(plan.split_size, 5);
        let ranges = plan.chunk_ranges();
        assert_eq!(ranges.len(), plan.chunk_count());
        assert_eq!(ranges.first().unwrap().start, 3);
        assert_eq!(ranges.last().unwrap().end, 19);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end + 1, pair[1].start);
        }
        assert_eq!(plan.full_chunks(), 3);
        assert_eq!(plan.remainder(), 2);
    }
}
