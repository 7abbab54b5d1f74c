//! Merges chunk responses into one partition response

use serde_json::Value;
use tracing::{info, warn};

use crate::domain::operation::{
    ChunkFailure, ChunkOutcome, OperationResultKind, OperationState,
};
use crate::domain::transport::{PartitionResponse, CONTENT_LENGTH, CONTENT_TYPE};
use crate::domain::DomainError;

/// Result handed back to the caller of a split partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub response: PartitionResponse,
    /// Chunks left out of the response, in chunk order
    pub failures: Vec<ChunkFailure>,
    pub kind: OperationResultKind,
}

/// Applies the failure policy and flattens successful chunk elements
#[derive(Debug, Clone, Copy)]
pub struct ResponseMerger {
    starting_page_number: u32,
}

impl ResponseMerger {
    pub fn new(starting_page_number: u32) -> Self {
        Self {
            starting_page_number,
        }
    }

    pub fn merge(&self, state: &OperationState) -> Result<MergeResult, DomainError> {
        let mut failures = Vec::new();
        let mut successes = Vec::new();

        for record in state.chunks() {
            match &record.outcome {
                Some(ChunkOutcome::Completed(response)) => successes.push((record, response)),
                Some(ChunkOutcome::Failed(failure)) => failures.push(failure.clone()),
                Some(ChunkOutcome::Cancelled) | None => {}
            }
        }

        if !state.allow_failed() {
            if let Some(failure) = failures.first() {
                return Err(DomainError::chunk_failed(failure.clone()));
            }
        }

        let Some((_, first)) = successes.first() else {
            return Err(match failures.into_iter().next() {
                Some(failure) => DomainError::chunk_failed(failure),
                None => DomainError::internal("No chunk completed and no failure was recorded"),
            });
        };
        let mut headers = first.headers.clone();

        let mut elements = Vec::new();
        for (record, response) in &successes {
            let chunk_elements = response.elements().map_err(|e| {
                DomainError::internal(format!(
                    "Response for set #{} is not a JSON element list: {}",
                    record.index + 1,
                    e
                ))
            })?;

            let chunk_start = record.pages.start - 1 + self.starting_page_number;
            elements.extend(align_page_numbers(chunk_elements, chunk_start));
        }

        if !failures.is_empty() {
            warn!(
                failed = failures.len(),
                "Some sets failed; their elements are omitted from the result"
            );
        }

        let kind = if failures.is_empty() && successes.len() == state.chunks().len() {
            OperationResultKind::AllSucceeded
        } else {
            OperationResultKind::PartialSucceeded
        };

        let body = Value::Array(elements).to_string();
        headers.insert(CONTENT_TYPE, "application/json");
        headers.insert(CONTENT_LENGTH, body.len().to_string());

        info!(
            succeeded = successes.len(),
            failed = failures.len(),
            "Merged split partition results"
        );

        Ok(MergeResult {
            response: PartitionResponse {
                status: 200,
                headers,
                body: body.into(),
            },
            failures,
            kind,
        })
    }
}

fn page_number(element: &Value) -> Option<u64> {
    element.pointer("/metadata/page_number").and_then(Value::as_u64)
}

/// Bring one chunk's elements into document page numbering. The choice is
/// made once per chunk: if any page number falls below the chunk's first
/// page, the server numbered from 1 and every element is shifted.
fn align_page_numbers(mut elements: Vec<Value>, chunk_start: u32) -> Vec<Value> {
    let chunk_start = u64::from(chunk_start);
    let relative = elements
        .iter()
        .filter_map(page_number)
        .min()
        .is_some_and(|lowest| lowest < chunk_start);

    if !relative {
        return elements;
    }

    let shift = chunk_start - 1;
    for element in &mut elements {
        if let Some(page) = element.pointer_mut("/metadata/page_number") {
            if let Some(current) = page.as_u64() {
                *page = Value::from(current + shift);
            }
        }
    }

    elements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::operation::{ChunkStatus, OperationId};
    use crate::domain::split::PageRange;
    use serde_json::json;

    fn elements_for(pages: PageRange) -> Value {
        Value::Array(
            (pages.start..=pages.end)
                .map(|page| json!({"type": "NarrativeText", "text": format!("p{}", page), "metadata": {"page_number": page}}))
                .collect(),
        )
    }

    fn finished_state(allow_failed: bool, failing: &[usize]) -> OperationState {
        let pages: Vec<_> = (0..4u32).map(|i| PageRange::new(i * 2 + 1, i * 2 + 2)).collect();
        let mut state = OperationState::new(OperationId::generate(), 2, allow_failed, &pages);

        for (index, range) in pages.iter().enumerate() {
            state.mark_dispatched(index).unwrap();
            let outcome = if failing.contains(&index) {
                ChunkOutcome::Failed(ChunkFailure::status(
                    index,
                    *range,
                    &PartitionResponse::new(500, "boom"),
                ))
            } else {
                let mut response = PartitionResponse::json(200, &elements_for(*range));
                response.headers.insert("x-request-id", format!("req-{}", index));
                ChunkOutcome::Completed(response)
            };
            state.record_outcome(index, outcome).unwrap();
        }

        state
    }

    #[test]
    fn test_merge_all_succeeded() {
        let result = ResponseMerger::new(1).merge(&finished_state(false, &[])).unwrap();

        assert_eq!(result.kind, OperationResultKind::AllSucceeded);
        assert!(result.failures.is_empty());
        assert_eq!(result.response.status, 200);

        let elements = result.response.elements().unwrap();
        assert_eq!(elements, elements_for(PageRange::new(1, 8)).as_array().unwrap().clone());
        assert_eq!(result.response.headers.get("x-request-id"), Some("req-0"));
        assert_eq!(
            result.response.headers.get(CONTENT_LENGTH),
            Some(result.response.body.len().to_string().as_str())
        );
    }

    #[test]
    fn test_best_effort_omits_failed_chunks() {
        let result = ResponseMerger::new(1).merge(&finished_state(true, &[1, 3])).unwrap();

        assert_eq!(result.kind, OperationResultKind::PartialSucceeded);
        let chunk_indexes: Vec<_> = result.failures.iter().map(|f| f.chunk_index).collect();
        assert_eq!(chunk_indexes, vec![1, 3]);

        let texts: Vec<_> = result
            .response
            .elements()
            .unwrap()
            .iter()
            .map(|e| e["text"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(texts, vec!["p1", "p2", "p5", "p6"]);
    }

    #[test]
    fn test_strict_surfaces_lowest_index_failure() {
        let err = ResponseMerger::new(1).merge(&finished_state(false, &[2, 1])).unwrap_err();
        assert_eq!(err.chunk_failure().unwrap().chunk_index, 1);
    }

    #[test]
    fn test_best_effort_all_failed() {
        let err = ResponseMerger::new(1)
            .merge(&finished_state(true, &[0, 1, 2, 3]))
            .unwrap_err();
        assert_eq!(err.chunk_failure().unwrap().chunk_index, 0);
    }

    #[test]
    fn test_cancelled_chunks_are_neither_success_nor_failure() {
        let pages = [PageRange::new(1, 2), PageRange::new(3, 4)];
        let mut state = OperationState::new(OperationId::generate(), 2, true, &pages);
        state.mark_dispatched(0).unwrap();
        state
            .record_outcome(0, ChunkOutcome::Completed(PartitionResponse::json(200, &json!([]))))
            .unwrap();
        state.record_outcome(1, ChunkOutcome::Cancelled).unwrap();
        assert_eq!(state.chunks()[1].status, ChunkStatus::Cancelled);

        let result = ResponseMerger::new(1).merge(&state).unwrap();
        assert!(result.failures.is_empty());
        assert_eq!(result.kind, OperationResultKind::PartialSucceeded);
    }

    fn page_elements(pages: std::ops::RangeInclusive<u64>) -> Value {
        Value::Array(pages.map(|page| json!({"metadata": {"page_number": page}})).collect())
    }

    fn merged_pages(state: &OperationState) -> Vec<u64> {
        ResponseMerger::new(1)
            .merge(state)
            .unwrap()
            .response
            .elements()
            .unwrap()
            .iter()
            .filter_map(page_number)
            .collect()
    }

    #[test]
    fn test_chunk_numbered_from_one_is_shifted_as_a_whole() {
        let pages = [PageRange::new(1, 2), PageRange::new(3, 12)];
        let mut state = OperationState::new(OperationId::generate(), 2, false, &pages);
        for (index, range) in pages.iter().enumerate() {
            state.mark_dispatched(index).unwrap();
            let body = page_elements(1..=u64::from(range.page_count()));
            state
                .record_outcome(index, ChunkOutcome::Completed(PartitionResponse::json(200, &body)))
                .unwrap();
        }

        assert_eq!(merged_pages(&state), (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_document_numbered_chunk_is_left_alone() {
        let pages = [PageRange::new(1, 4), PageRange::new(5, 8)];
        let mut state = OperationState::new(OperationId::generate(), 2, false, &pages);
        for (index, range) in pages.iter().enumerate() {
            state.mark_dispatched(index).unwrap();
            // Sparse elements: a chunk whose first pages carry nothing.
            let body = page_elements(u64::from(range.start) + 1..=u64::from(range.end));
            state
                .record_outcome(index, ChunkOutcome::Completed(PartitionResponse::json(200, &body)))
                .unwrap();
        }

        assert_eq!(merged_pages(&state), vec![2, 3, 4, 6, 7, 8]);
    }

    #[test]
    fn test_elements_without_page_numbers_pass_through() {
        let elements = vec![json!({"text": "x"}), json!({"metadata": {"page_number": 1}})];
        assert_eq!(
            align_page_numbers(elements, 5),
            vec![json!({"text": "x"}), json!({"metadata": {"page_number": 5}})]
        );
        assert_eq!(align_page_numbers(vec![json!({"text": "x"})], 5), vec![json!({"text": "x"})]);
    }

    #[test]
    fn test_starting_page_offset_applies() {
        let pages = [PageRange::new(3, 4)];
        let mut state = OperationState::new(OperationId::generate(), 1, false, &pages);
        state.mark_dispatched(0).unwrap();
        let body = json!([{"metadata": {"page_number": 1}}, {"metadata": {"page_number": 2}}]);
        state
            .record_outcome(0, ChunkOutcome::Completed(PartitionResponse::json(200, &body)))
            .unwrap();

        let result = ResponseMerger::new(10).merge(&state).unwrap();
        let pages: Vec<_> = result
            .response
            .elements()
            .unwrap()
            .iter()
            .map(|e| e["metadata"]["page_number"].as_u64().unwrap())
            .collect();
        assert_eq!(pages, vec![12, 13]);
    }
}
