//! Storage capability consumed by the commit path.

/// SQLite-backed store implementation.
pub mod sqlite;

use thiserror::Error;

use crate::{
    button::Button,
    types::{ButtonId, ScreenId},
};

/// Store-layer failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Payload (de)serialization failure.
    #[error("payload error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Any other store condition.
    #[error("{0}")]
    Message(String),
}

/// Store-layer result alias.
pub type StoreResult<T> = Result<T, StoreError>;

/// Per-row result of a batch insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Correlation tag: the provisional identity carried by the staged add.
    pub provisional_id: ButtonId,
    /// True when the row was inserted.
    pub success: bool,
    /// Store-assigned identity, present on success.
    pub assigned_id: Option<ButtonId>,
    /// Row-level error message, present on failure.
    pub error: Option<String>,
}

/// Per-row result of a batch update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Committed identity the update targeted.
    pub id: ButtonId,
    /// True when the row was updated.
    pub success: bool,
    /// Row-level error message, present on failure.
    pub error: Option<String>,
}

/// Narrow storage interface required by [`crate::commit::CommitCoordinator`].
///
/// The three batch operations report per-row outcomes instead of failing the
/// whole call on a row-level rejection; a row failure must leave the open
/// transaction usable so the coordinator can gather full diagnostics before
/// rolling back. Call-level `Err` is reserved for transport/statement
/// failures.
pub trait ButtonStore: Send {
    /// Opens the transaction scoping the batch operations.
    fn begin_txn(&mut self) -> StoreResult<()>;
    /// Makes the open transaction durable.
    fn commit_txn(&mut self) -> StoreResult<()>;
    /// Discards every change made inside the open transaction.
    fn rollback_txn(&mut self) -> StoreResult<()>;

    /// Inserts `rows` under `screen_id`, one outcome per row in order.
    fn batch_insert(&mut self, screen_id: ScreenId, rows: &[Button])
    -> StoreResult<Vec<InsertOutcome>>;
    /// Replaces committed rows under `screen_id`, one outcome per row in order.
    fn batch_update(&mut self, screen_id: ScreenId, rows: &[Button])
    -> StoreResult<Vec<UpdateOutcome>>;
    /// Deletes `ids` under `screen_id` in one statement; returns rows removed.
    fn batch_delete(&mut self, screen_id: ScreenId, ids: &[ButtonId]) -> StoreResult<usize>;

    /// Reads every button of `screen_id` in display order.
    fn query_screen(&self, screen_id: ScreenId) -> StoreResult<Vec<Button>>;
    /// Reads one button of `screen_id` by committed identity.
    fn query_button(&self, screen_id: ScreenId, id: ButtonId) -> StoreResult<Option<Button>>;

    /// Upper bound on identities per delete statement.
    ///
    /// Callers slice longer lists into chunks of at most this size.
    fn delete_chunk_limit(&self) -> usize {
        usize::MAX
    }
}

impl<S: ButtonStore + ?Sized> ButtonStore for &mut S {
    fn begin_txn(&mut self) -> StoreResult<()> {
        (**self).begin_txn()
    }
    fn commit_txn(&mut self) -> StoreResult<()> {
        (**self).commit_txn()
    }
    fn rollback_txn(&mut self) -> StoreResult<()> {
        (**self).rollback_txn()
    }
    fn batch_insert(
        &mut self,
        screen_id: ScreenId,
        rows: &[Button],
    ) -> StoreResult<Vec<InsertOutcome>> {
        (**self).batch_insert(screen_id, rows)
    }
    fn batch_update(
        &mut self,
        screen_id: ScreenId,
        rows: &[Button],
    ) -> StoreResult<Vec<UpdateOutcome>> {
        (**self).batch_update(screen_id, rows)
    }
    fn batch_delete(&mut self, screen_id: ScreenId, ids: &[ButtonId]) -> StoreResult<usize> {
        (**self).batch_delete(screen_id, ids)
    }
    fn query_screen(&self, screen_id: ScreenId) -> StoreResult<Vec<Button>> {
        (**self).query_screen(screen_id)
    }
    fn query_button(&self, screen_id: ScreenId, id: ButtonId) -> StoreResult<Option<Button>> {
        (**self).query_button(screen_id, id)
    }
    fn delete_chunk_limit(&self) -> usize {
        (**self).delete_chunk_limit()
    }
}
