//! # Chain Service
//!
//! Application service owning the chain tip: genesis bootstrap, append,
//! full verification and fork resolution.

use std::cmp::Ordering;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::adapters::loaders::{ChunkValidatingLoader, LastBlockValidatingLoader, MemoizingLoader};
use crate::algorithms::find_divergence;
use crate::config::ChainConfig;
use crate::domain::{
    group_is_valid, single_block_is_valid, total_difficulty, Block, ChainError, ChunkBoundary,
    MergeOutcome, MergeStage, Payload, StorageError, ValidationMode,
};
use crate::ports::{BlockLoader, BlockStorage, ChainApi, Clock, ProofEngine};

/// Chain orchestrator over a storage backend that can also page itself.
pub struct ChainService<D: Payload, S> {
    /// Durable storage, also read back as the local loader.
    storage: S,
    /// Proof scheme.
    engine: Arc<dyn ProofEngine<D>>,
    /// Timestamp source for new blocks.
    clock: Arc<dyn Clock>,
    /// Current authoritative tip.
    tip: Block<D>,
}

impl<D, S> ChainService<D, S>
where
    D: Payload,
    S: BlockStorage<D> + BlockLoader<D>,
{
    /// Open the chain held by `storage`.
    ///
    /// Empty storage is bootstrapped with a genesis block built from
    /// `genesis`; without one this fails with `MissingGenesis`. The payload
    /// is ignored when storage already has a tip.
    pub fn open(
        genesis: Option<D>,
        mut storage: S,
        engine: Arc<dyn ProofEngine<D>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ChainError> {
        let tip = match storage.load_last_block() {
            Ok(tip) => {
                tracing::info!(tip = %tip.hash, "Opened existing chain");
                tip
            }
            Err(StorageError::Empty) => {
                let data = genesis.ok_or(ChainError::MissingGenesis)?;
                let block = Block::genesis(data, engine.as_ref(), clock.as_ref());
                storage.store_block(block.clone())?;
                tracing::info!(genesis = %block.hash, "Bootstrapped chain with genesis block");
                block
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            storage,
            engine,
            clock,
            tip,
        })
    }

    /// Open with the proof scheme selected by `config`.
    pub fn from_config(
        config: &ChainConfig,
        genesis: Option<D>,
        storage: S,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ChainError> {
        config.validate()?;
        Self::open(genesis, storage, config.proof.build()?, clock)
    }

    /// Storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Proof scheme.
    pub fn engine(&self) -> &Arc<dyn ProofEngine<D>> {
        &self.engine
    }

    /// Give the storage backend back.
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Resolve a fork against a raw, untrusted source.
    ///
    /// The source is wrapped in the validating pipeline with a page cache
    /// of `cache_capacity`, so every page the divergence search pulls from
    /// it is checked once.
    pub fn sync_from<L: BlockLoader<D>>(
        &mut self,
        source: L,
        chunk_size: usize,
        cache_capacity: NonZeroUsize,
    ) -> Result<MergeOutcome, ChainError> {
        let pipeline = LastBlockValidatingLoader::new(
            MemoizingLoader::new(
                ChunkValidatingLoader::new(source, Arc::clone(&self.engine)),
                cache_capacity,
            ),
            Arc::clone(&self.engine),
        );

        let outcome = self.merge(&pipeline, chunk_size);
        let stats = pipeline.inner().stats();
        tracing::debug!(
            hits = stats.hits,
            misses = stats.misses,
            entries = stats.entries,
            "Sync page cache"
        );
        outcome
    }
}

fn divergence_error(e: ChainError) -> ChainError {
    match e {
        ChainError::NoCommonBlock => e,
        other => ChainError::merge(MergeStage::DivergenceSearch, other),
    }
}

impl<D, S> ChainApi<D> for ChainService<D, S>
where
    D: Payload,
    S: BlockStorage<D> + BlockLoader<D>,
{
    fn tip(&self) -> &Block<D> {
        &self.tip
    }

    fn append(&mut self, payload: D) -> Result<&Block<D>, ChainError> {
        let engine = self.engine.as_ref();
        let block = Block::new(payload, &self.tip, engine, self.clock.as_ref());
        single_block_is_valid(&block, &self.tip, engine)?;

        self.storage.store_block(block.clone())?;
        tracing::info!(hash = %block.hash, timestamp = %block.timestamp, "Appended block");
        self.tip = block;
        Ok(&self.tip)
    }

    fn merge<L: BlockLoader<D>>(
        &mut self,
        alternate: &L,
        chunk_size: usize,
    ) -> Result<MergeOutcome, ChainError> {
        let divergence =
            find_divergence(&self.storage, alternate, chunk_size).map_err(divergence_error)?;

        if divergence.in_sync() {
            tracing::info!(tip = %self.tip.hash, "Chains already in sync");
            return Ok(MergeOutcome::InSync);
        }

        let engine = self.engine.as_ref();
        let local_difficulty = total_difficulty(&divergence.left, engine)
            .map_err(|e| ChainError::merge(MergeStage::LocalDifficulty, e))?;
        let alternate_difficulty = total_difficulty(&divergence.right, engine)
            .map_err(|e| ChainError::merge(MergeStage::AlternateDifficulty, e))?;

        tracing::info!(
            common = %divergence.common.hash,
            local_blocks = divergence.left.len(),
            alternate_blocks = divergence.right.len(),
            local_difficulty,
            alternate_difficulty,
            "Resolving fork"
        );

        match local_difficulty.cmp(&alternate_difficulty) {
            Ordering::Greater => {
                tracing::info!("Local chain is heavier, keeping it");
                return Ok(MergeOutcome::KeptLocal {
                    local_difficulty,
                    alternate_difficulty,
                });
            }
            Ordering::Equal => {
                tracing::warn!(difficulty = local_difficulty, "Fork sides weigh the same");
                return Err(ChainError::EqualDifficulties {
                    difficulty: local_difficulty,
                });
            }
            Ordering::Less => {}
        }

        group_is_valid(
            &divergence.right,
            &[],
            ValidationMode::AsChunk(ChunkBoundary::Predecessor(&divergence.common)),
            engine,
        )
        .map_err(|e| ChainError::merge(MergeStage::ValidateAlternate, e))?;

        self.storage
            .delete_block_group(&divergence.left)
            .map_err(|e| ChainError::merge(MergeStage::DeleteLocal, e))?;
        self.storage
            .store_block_group(&divergence.right)
            .map_err(|e| ChainError::merge(MergeStage::StoreAlternate, e))?;
        self.tip = self
            .storage
            .load_last_block()
            .map_err(|e| ChainError::merge(MergeStage::ReloadTip, e))?;

        tracing::info!(tip = %self.tip.hash, "Replaced local chain with heavier fork");
        Ok(MergeOutcome::Replaced {
            removed: divergence.left.len(),
            added: divergence.right.len(),
            local_difficulty,
            alternate_difficulty,
        })
    }

    fn verify(&self, chunk_size: usize) -> Result<usize, ChainError> {
        if chunk_size == 0 {
            return Err(ChainError::InvalidConfig(
                "chunk size must be positive".to_string(),
            ));
        }

        // Each page is requested twice: as lookahead, then as the main page.
        let pages = NonZeroUsize::MIN.saturating_add(1);
        let pipeline = LastBlockValidatingLoader::new(
            MemoizingLoader::new(
                ChunkValidatingLoader::new(&self.storage, Arc::clone(&self.engine)),
                pages,
            ),
            Arc::clone(&self.engine),
        );

        let mut cursor = pipeline.head_cursor();
        let mut checked = 0;
        loop {
            let (page, next) = pipeline.load_blocks(&cursor, chunk_size)?;
            if page.is_empty() {
                break;
            }
            checked += page.len();
            cursor = next;
        }

        tracing::info!(blocks = checked, tip = %self.tip.hash, "Verified chain");
        Ok(checked)
    }
}
