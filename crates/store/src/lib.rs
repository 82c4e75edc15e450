//! Persistent block, commit and state repository.
//!
//! Backed by a single redb database with three tables: `blocks` and
//! `commits` keyed by height, and a singleton `state` entry. Every logical
//! operation commits one write transaction, so a crash mid-operation leaves
//! the store unchanged. The chain tip is cached in an atomic and only ever
//! moves forward.

#![forbid(unsafe_code)]
#![deny(trivial_casts, trivial_numeric_casts)]
#![allow(missing_docs)]

use std::{
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use cerulean_types::{
    codec::{CodecError, Protobuf},
    Block, Commit, State,
};
use redb::ReadableTable;
use thiserror::Error;

mod keys;
mod metrics;

pub use metrics::StoreMetrics;

use keys::HeightKey;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("failed to join on task: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("no block at height {0}")]
    BlockNotFound(u64),

    #[error("no commit at height {0}")]
    CommitNotFound(u64),

    #[error("no state snapshot stored")]
    StateNotFound,

    #[error("height {0} already holds a different block")]
    Conflict(u64),
}

const BLOCKS_TABLE: redb::TableDefinition<HeightKey, Vec<u8>> =
    redb::TableDefinition::new("blocks");

const COMMITS_TABLE: redb::TableDefinition<HeightKey, Vec<u8>> =
    redb::TableDefinition::new("commits");

const STATE_TABLE: redb::TableDefinition<&str, Vec<u8>> = redb::TableDefinition::new("state");

const STATE_KEY: &str = "state";

struct Db {
    db: redb::Database,
    /// Largest height with a saved block, or `initial_height - 1` when the
    /// store is empty. Advanced with `fetch_max`, never lowered.
    height: AtomicU64,
    metrics: StoreMetrics,
}

impl Db {
    fn open(path: impl AsRef<Path>, initial_height: u64, metrics: StoreMetrics) -> Result<Self, StoreError> {
        let db = redb::Database::create(path)?;

        let tx = db.begin_write()?;
        let tip = {
            let blocks = tx.open_table(BLOCKS_TABLE)?;
            let _ = tx.open_table(COMMITS_TABLE)?;
            let _ = tx.open_table(STATE_TABLE)?;
            let tip = blocks.last()?.map(|(key, _)| key.value());
            tip
        };
        tx.commit()?;

        let height = tip.unwrap_or(initial_height.saturating_sub(1));
        metrics.set_height(height);

        Ok(Self { db, height: AtomicU64::new(height), metrics })
    }

    fn save_block(&self, block: &Block, commit: &Commit) -> Result<(), StoreError> {
        let start = Instant::now();
        let height = block.height();
        let block_bytes = block.to_bytes();
        let commit_bytes = commit.to_bytes();
        let write_bytes = (block_bytes.len() + commit_bytes.len()) as u64;

        let tx = self.db.begin_write()?;
        {
            let mut blocks = tx.open_table(BLOCKS_TABLE)?;
            if let Some(existing) = blocks.get(&height)? {
                if existing.value() != block_bytes.as_ref() {
                    return Err(StoreError::Conflict(height));
                }
                // Same block re-delivered; nothing to do.
                return Ok(());
            }
            blocks.insert(height, block_bytes.to_vec())?;

            let mut commits = tx.open_table(COMMITS_TABLE)?;
            commits.insert(height, commit_bytes.to_vec())?;
        }
        tx.commit()?;

        let tip = self.height.fetch_max(height, Ordering::SeqCst).max(height);
        self.metrics.set_height(tip);
        self.metrics.observe_write_time(start.elapsed());
        self.metrics.add_write_bytes(write_bytes);

        Ok(())
    }

    fn load_block(&self, height: u64) -> Result<Block, StoreError> {
        let start = Instant::now();

        let tx = self.db.begin_read()?;
        let table = tx.open_table(BLOCKS_TABLE)?;
        let value = table.get(&height)?.ok_or(StoreError::BlockNotFound(height))?;
        let bytes = value.value();

        self.metrics.observe_read_time(start.elapsed());
        self.metrics.add_read_bytes(bytes.len() as u64);

        Ok(Block::from_bytes(&bytes)?)
    }

    fn load_commit(&self, height: u64) -> Result<Commit, StoreError> {
        let start = Instant::now();

        let tx = self.db.begin_read()?;
        let table = tx.open_table(COMMITS_TABLE)?;
        let value = table.get(&height)?.ok_or(StoreError::CommitNotFound(height))?;
        let bytes = value.value();

        self.metrics.observe_read_time(start.elapsed());
        self.metrics.add_read_bytes(bytes.len() as u64);

        Ok(Commit::from_bytes(&bytes)?)
    }

    fn update_state(&self, state: &State) -> Result<(), StoreError> {
        let start = Instant::now();
        let bytes = state.to_bytes();
        let write_bytes = bytes.len() as u64;

        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(STATE_TABLE)?;
            table.insert(STATE_KEY, bytes.to_vec())?;
        }
        tx.commit()?;

        self.metrics.observe_write_time(start.elapsed());
        self.metrics.add_write_bytes(write_bytes);

        Ok(())
    }

    fn load_state(&self) -> Result<State, StoreError> {
        let start = Instant::now();

        let tx = self.db.begin_read()?;
        let table = tx.open_table(STATE_TABLE)?;
        let value = table.get(STATE_KEY)?.ok_or(StoreError::StateNotFound)?;
        let bytes = value.value();

        self.metrics.observe_read_time(start.elapsed());
        self.metrics.add_read_bytes(bytes.len() as u64);

        Ok(State::from_bytes(&bytes)?)
    }
}

/// Handle to the block store; cheap to clone, safe to share across tasks.
#[derive(Clone)]
pub struct Store {
    db: Arc<Db>,
}

impl Store {
    /// Opens (or creates) the database at `path`.
    ///
    /// `initial_height` is the genesis height; an empty store reports
    /// `initial_height - 1` as its height.
    pub fn open(
        path: impl AsRef<Path>,
        initial_height: u64,
        metrics: StoreMetrics,
    ) -> Result<Self, StoreError> {
        let db = Db::open(path, initial_height, metrics)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Largest height with a saved block. Monotone non-decreasing for the
    /// lifetime of the process.
    pub fn height(&self) -> u64 {
        self.db.height.load(Ordering::SeqCst)
    }

    /// Atomically persists `block` and its `commit` under the block's
    /// height. Saving an identical block again is a no-op; a different
    /// block at an occupied height is a [`StoreError::Conflict`].
    pub async fn save_block(&self, block: &Block, commit: &Commit) -> Result<(), StoreError> {
        let db = Arc::clone(&self.db);
        let block = block.clone();
        let commit = commit.clone();
        tokio::task::spawn_blocking(move || db.save_block(&block, &commit)).await?
    }

    pub async fn load_block(&self, height: u64) -> Result<Block, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.load_block(height)).await?
    }

    pub async fn load_commit(&self, height: u64) -> Result<Commit, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.load_commit(height)).await?
    }

    /// Overwrites the singleton state snapshot.
    pub async fn update_state(&self, state: &State) -> Result<(), StoreError> {
        let db = Arc::clone(&self.db);
        let state = state.clone();
        tokio::task::spawn_blocking(move || db.update_state(&state)).await?
    }

    /// Fails with [`StoreError::StateNotFound`] on a fresh store, which is
    /// the signal to bootstrap from genesis.
    pub async fn load_state(&self) -> Result<State, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.load_state()).await?
    }
}
