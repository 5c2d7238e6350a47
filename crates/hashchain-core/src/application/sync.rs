//! # Storage Sync Driver
//!
//! Pages a loader into group-capable storage until the loader returns an
//! empty page.

use crate::domain::{ChainError, Payload, SyncReport};
use crate::ports::outbound::{BlockLoader, BlockStorage};

fn with_cursor<C: std::fmt::Debug>(cursor: &C, error: ChainError) -> ChainError {
    match error {
        ChainError::Load { .. } => error,
        other => ChainError::load(cursor, other),
    }
}

/// Copy every page of `loader`, starting at `start`, into `storage`.
///
/// Each page is stored with one `store_block_group` call. The report's
/// cursor is the one that produced the terminating empty page, so a later
/// call can resume from it.
pub fn load_storage<D, L, S>(
    loader: &L,
    storage: &mut S,
    start: L::Cursor,
    count: usize,
) -> Result<SyncReport<L::Cursor>, ChainError>
where
    D: Payload,
    L: BlockLoader<D>,
    S: BlockStorage<D> + ?Sized,
{
    if count == 0 {
        return Err(ChainError::InvalidConfig(
            "page size must be positive".to_string(),
        ));
    }

    let mut report = SyncReport {
        cursor: start,
        pages: 0,
        blocks: 0,
    };

    loop {
        let (page, next) = loader
            .load_blocks(&report.cursor, count)
            .map_err(|e| with_cursor(&report.cursor, e))?;
        if page.is_empty() {
            break;
        }

        storage
            .store_block_group(&page)
            .map_err(|e| ChainError::load(&report.cursor, e.into()))?;

        report.pages += 1;
        report.blocks += page.len();
        tracing::debug!(
            cursor = ?report.cursor,
            blocks = page.len(),
            "Stored page"
        );
        report.cursor = next;
    }

    tracing::info!(
        pages = report.pages,
        blocks = report.blocks,
        "Storage sync complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::SteppingClock;
    use crate::adapters::memory_storage::MemoryStorage;
    use crate::algorithms::IdentityProof;
    use crate::domain::StorageError;
    use crate::test_utils::{build_chain, start_time, FailingStorage};

    fn source() -> MemoryStorage<String> {
        let clock = SteppingClock::hourly(start_time());
        MemoryStorage::from_blocks(build_chain(
            &IdentityProof,
            &clock,
            "genesis",
            &["a", "b", "c", "d", "e", "f"],
        ))
    }

    #[test]
    fn test_copies_everything() {
        let source = source();
        let mut target = MemoryStorage::new();

        let report = load_storage(&source, &mut target, 0, 3).unwrap();
        assert_eq!(report, SyncReport { cursor: 7, pages: 3, blocks: 7 });
        assert_eq!(target.blocks_newest_first(), source.blocks_newest_first());
    }

    #[test]
    fn test_resumes_from_cursor() {
        let source = source();
        let mut target = MemoryStorage::new();

        let report = load_storage(&source, &mut target, 5, 4).unwrap();
        assert_eq!(report.blocks, 2);
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn test_zero_page_size() {
        let mut target = MemoryStorage::new();
        assert!(matches!(
            load_storage(&source(), &mut target, 0, 0),
            Err(ChainError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_storage_failure_carries_cursor() {
        let source = source();
        let mut target = FailingStorage::new(MemoryStorage::new());
        target.fail_stores_after(4);

        let err = load_storage(&source, &mut target, 0, 3).unwrap_err();
        assert!(matches!(err, ChainError::Load { ref cursor, .. } if cursor == "3"));
        assert!(matches!(
            err.root(),
            ChainError::Storage(StorageError::AtIndex { index: 1, .. })
        ));
    }
}
