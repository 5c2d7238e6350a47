//! # Value Objects
//!
//! Results reported by the orchestrator and the sync driver.

/// Outcome of a successful fork resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Both chains already agree at their tips.
    InSync,
    /// Local chain is heavier and was kept unchanged.
    KeptLocal {
        /// Difficulty of the local-only prefix
        local_difficulty: i64,
        /// Difficulty of the alternate-only prefix
        alternate_difficulty: i64,
    },
    /// Local-only prefix was replaced by the alternate-only prefix.
    Replaced {
        /// Blocks removed from storage
        removed: usize,
        /// Blocks added to storage
        added: usize,
        /// Difficulty of the removed prefix
        local_difficulty: i64,
        /// Difficulty of the added prefix
        alternate_difficulty: i64,
    },
}

/// Result of paging a source into storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncReport<C> {
    /// Cursor that produced the first empty page.
    pub cursor: C,
    /// Non-empty pages stored.
    pub pages: usize,
    /// Blocks stored.
    pub blocks: usize,
}
