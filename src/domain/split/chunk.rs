//! Chunk construction from a validated document

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::planner::{PageRange, SplitPlan};
use crate::domain::document::PdfDocument;
use crate::domain::form::FilePart;
use crate::domain::DomainError;

/// One page-range slice of the submitted document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position among sibling chunks, in page order
    pub index: usize,
    pub range: PageRange,
    /// Zero-based index of the chunk's first page in the full document
    pub offset: u32,
    pub file: FilePart,
}

impl Chunk {
    /// 1-based set number used in log lines
    pub fn set_number(&self) -> usize {
        self.index + 1
    }
}

/// Where chunk bytes are kept until they are sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStorage {
    Memory,
    /// One file per chunk inside this directory
    Disk(PathBuf),
}

/// Slices a document into chunks following a plan
#[derive(Debug, Clone)]
pub struct ChunkBuilder {
    document: Arc<PdfDocument>,
    filename: String,
    storage: ChunkStorage,
}

impl ChunkBuilder {
    pub fn new(document: Arc<PdfDocument>, filename: impl Into<String>) -> Self {
        Self {
            document,
            filename: filename.into(),
            storage: ChunkStorage::Memory,
        }
    }

    pub fn with_storage(mut self, storage: ChunkStorage) -> Self {
        self.storage = storage;
        self
    }

    /// Build every chunk of the plan. CPU and disk bound, so callers on the
    /// runtime should go through [`ChunkBuilder::build_async`].
    pub fn build(&self, plan: &SplitPlan) -> Result<Vec<Chunk>, DomainError> {
        plan.chunk_ranges()
            .into_iter()
            .enumerate()
            .map(|(index, range)| self.build_chunk(index, range))
            .collect()
    }

    pub async fn build_async(self, plan: SplitPlan) -> Result<Vec<Chunk>, DomainError> {
        tokio::task::spawn_blocking(move || self.build(&plan))
            .await
            .map_err(|e| DomainError::internal(format!("Chunk builder task failed: {}", e)))?
    }

    fn build_chunk(&self, index: usize, range: PageRange) -> Result<Chunk, DomainError> {
        let bytes = self.document.extract_pages(range.start, range.end)?;

        let file = match &self.storage {
            ChunkStorage::Memory => FilePart::new(self.filename.clone(), bytes),
            ChunkStorage::Disk(dir) => {
                let path = spool_path(dir, index, range);
                std::fs::write(&path, &bytes)?;
                debug!(chunk_index = index, path = %path.display(), "Spooled chunk to disk");
                FilePart::spooled(self.filename.clone(), path)
            }
        };

        Ok(Chunk {
            index,
            range,
            offset: range.start - 1,
            file,
        })
    }
}

fn spool_path(dir: &Path, index: usize, range: PageRange) -> PathBuf {
    dir.join(format!("chunk_{:04}_{}-{}.pdf", index, range.start, range.end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::test_support::{create_test_pdf, page_labels};
    use crate::domain::split::{SplitDecision, SplitLimits};

    fn plan_for(pages: u32, concurrency: usize) -> (Arc<PdfDocument>, SplitPlan) {
        let document = Arc::new(PdfDocument::load(&create_test_pdf(pages)).unwrap());
        let range = PageRange::new(1, pages);
        let SplitDecision::Split(plan) =
            SplitPlan::new(range, pages, concurrency, &SplitLimits::default())
        else {
            panic!("expected a split");
        };
        (document, plan)
    }

    #[test]
    fn test_memory_chunks() {
        let (document, plan) = plan_for(5, 3);
        let chunks = ChunkBuilder::new(document, "doc.pdf").build(&plan).unwrap();

        let ranges: Vec<_> = chunks.iter().map(|c| (c.range.start, c.range.end)).collect();
        assert_eq!(ranges, vec![(1, 2), (3, 4), (5, 5)]);
        assert_eq!(chunks.iter().map(|c| c.offset).collect::<Vec<_>>(), vec![0, 2, 4]);
        assert_eq!(chunks[2].set_number(), 3);
        assert!(chunks.iter().all(|c| c.file.filename == "doc.pdf"));
    }

    #[tokio::test]
    async fn test_disk_chunks_match_memory_chunks() {
        let (document, plan) = plan_for(7, 2);
        let dir = tempfile::tempdir().unwrap();

        let memory = ChunkBuilder::new(document.clone(), "doc.pdf")
            .build_async(plan)
            .await
            .unwrap();
        let disk = ChunkBuilder::new(document, "doc.pdf")
            .with_storage(ChunkStorage::Disk(dir.path().to_path_buf()))
            .build_async(plan)
            .await
            .unwrap();

        assert_eq!(memory.len(), disk.len());
        for (m, d) in memory.iter().zip(&disk) {
            assert_eq!(m.range, d.range);
            let spooled = d.file.content.spooled_path().unwrap();
            assert!(spooled.starts_with(dir.path()));

            let from_memory = m.file.content.load().await.unwrap();
            let from_disk = d.file.content.load().await.unwrap();
            assert_eq!(page_labels(&from_memory), page_labels(&from_disk));
        }

        assert_eq!(page_labels(&disk[1].file.content.load().await.unwrap()), vec!["Page 5", "Page 6", "Page 7"]);
    }
}
