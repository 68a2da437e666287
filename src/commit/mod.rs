//! All-or-nothing application of a drained staging batch.

use hashbrown::HashMap;
use tracing::warn;

use crate::{
    staging::DrainedBatch,
    store::{ButtonStore, StoreError},
    types::{ButtonId, ScreenId},
};

use thiserror::Error;

/// Total commit failure: nothing was attempted against the store and no
/// per-row diagnostics exist. The staged batch is untouched server-side.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The store connection or transaction could not be established.
    #[error("store unavailable: {0}")]
    Unavailable(#[source] StoreError),
}

/// Per-identity outcome of one commit attempt.
///
/// Keys are provisional (negative) identities for adds and committed
/// (positive) identities for updates and deletes; the sign keeps the two
/// namespaces disjoint. When `success` is false every change implied by the
/// batch has been rolled back, and `outcomes` only reports which rows the
/// store accepted before the rollback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitResult {
    /// True when every row succeeded and the transaction committed.
    pub success: bool,
    /// Per-identity success flags.
    pub outcomes: HashMap<ButtonId, bool>,
    /// Row-level error messages for failed identities.
    pub errors: HashMap<ButtonId, String>,
    /// Store-assigned identity per provisional identity, for successful adds.
    pub assigned: HashMap<ButtonId, ButtonId>,
    /// Step-level error when the batch aborted before all rows were attempted.
    pub fault: Option<String>,
}

impl CommitResult {
    /// Successful result for an empty batch.
    pub fn empty_success() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }
}

/// Applies drained batches to a [`ButtonStore`] as single transactions.
///
/// Owns the store handle; there are no process-wide connection singletons.
/// One commit per staging buffer may be in flight at a time (enforced here by
/// `&mut self`).
pub struct CommitCoordinator<S: ButtonStore> {
    store: S,
}

impl<S: ButtonStore> CommitCoordinator<S> {
    /// Wraps `store` for commit use.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Shared access to the store, for the read path.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Exclusive access to the store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Releases the store handle.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Commits `batch` under `screen_id` as one transaction.
    ///
    /// An empty batch returns success without contacting the store. Inserts
    /// run first (correlated by provisional identity), then updates, then
    /// deletes chunked by [`ButtonStore::delete_chunk_limit`]. If every row
    /// succeeds the transaction commits; if any row fails, or a step errors
    /// mid-transaction, everything including the delete step is rolled back
    /// and the observed per-row flags are returned for diagnostics. Nothing
    /// is retried.
    pub fn commit(
        &mut self,
        screen_id: ScreenId,
        batch: &DrainedBatch,
    ) -> Result<CommitResult, CommitError> {
        if batch.is_empty() {
            return Ok(CommitResult::empty_success());
        }

        self.store.begin_txn().map_err(CommitError::Unavailable)?;

        let mut result = self.apply_steps(screen_id, batch);

        if result.success {
            if let Err(err) = self.store.commit_txn() {
                result.success = false;
                result.fault = Some(err.to_string());
                if let Err(rb) = self.store.rollback_txn() {
                    warn!(error = %rb, "rollback failed after commit error");
                }
            }
        } else if let Err(rb) = self.store.rollback_txn() {
            warn!(error = %rb, "rollback failed after batch failure");
        }

        Ok(result)
    }

    fn apply_steps(&mut self, screen_id: ScreenId, batch: &DrainedBatch) -> CommitResult {
        let mut result = CommitResult {
            success: true,
            ..CommitResult::default()
        };

        if !batch.adds.is_empty() {
            match self.store.batch_insert(screen_id, &batch.adds) {
                Ok(rows) => {
                    for row in rows {
                        result.success &= row.success;
                        result.outcomes.insert(row.provisional_id, row.success);
                        if let Some(assigned) = row.assigned_id {
                            result.assigned.insert(row.provisional_id, assigned);
                        }
                        if let Some(error) = row.error {
                            result.errors.insert(row.provisional_id, error);
                        }
                    }
                }
                Err(err) => {
                    result.success = false;
                    result.fault = Some(format!("insert step failed: {err}"));
                    return result;
                }
            }
        }

        if !batch.updates.is_empty() {
            match self.store.batch_update(screen_id, &batch.updates) {
                Ok(rows) => {
                    for row in rows {
                        result.success &= row.success;
                        result.outcomes.insert(row.id, row.success);
                        if let Some(error) = row.error {
                            result.errors.insert(row.id, error);
                        }
                    }
                }
                Err(err) => {
                    result.success = false;
                    result.fault = Some(format!("update step failed: {err}"));
                    return result;
                }
            }
        }

        // Deletes run last so row diagnostics for adds/updates are complete
        // even when a delete chunk fails.
        let limit = self.store.delete_chunk_limit().max(1);
        for chunk in batch.deletes.chunks(limit) {
            match self.store.batch_delete(screen_id, chunk) {
                Ok(_) => {
                    for &id in chunk {
                        result.outcomes.insert(id, true);
                    }
                }
                Err(err) => {
                    result.success = false;
                    result.fault = Some(format!("delete step failed: {err}"));
                    for &id in chunk {
                        result.outcomes.insert(id, false);
                    }
                    return result;
                }
            }
        }

        result
    }
}
