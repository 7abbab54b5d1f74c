//! Split planning, chunk construction and chunk request materialization

mod chunk;
mod planner;
mod request;

pub use chunk::{Chunk, ChunkBuilder, ChunkStorage};
pub use planner::{
    resolve_page_range, PageRange, SplitDecision, SplitLimits, SplitPlan,
    DEFAULT_CONCURRENCY_LEVEL, DEFAULT_STARTING_PAGE_NUMBER, MAX_CONCURRENCY_LEVEL,
    MAX_PAGES_PER_SPLIT, MIN_PAGES_PER_SPLIT,
};
pub use request::{prepare_form, prepare_headers, RequestMaterializer};
