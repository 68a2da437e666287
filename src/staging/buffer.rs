use hashbrown::{HashMap, HashSet};
use thiserror::Error;

use crate::{button::Button, types::ButtonId};

/// Contract violation raised by a staging call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StagingError {
    /// An update or delete was staged against identity `0`.
    #[error("identity 0 is not a committed button identity")]
    UnsetIdentity,
}

/// Pending adds, updates, and deletes awaiting one atomic commit.
///
/// An identity appears in at most one of the three collections at any time:
/// updating a pending add rewrites the add in place, and deleting a pending
/// add removes the add without recording a delete, because the add was never
/// persisted. New buttons receive strictly negative provisional identities
/// (`-1`, `-2`, ...) that cannot collide with store-assigned positive ones.
///
/// Single-writer by contract; the buffer performs no synchronization of its
/// own.
#[derive(Debug, Default)]
pub struct StagingBuffer {
    pending_adds: Vec<Button>,
    pending_updates: HashMap<ButtonId, Button>,
    pending_deletes: HashSet<ButtonId>,
    next_provisional: ButtonId,
}

/// Contents read out of a [`StagingBuffer`] for one commit attempt.
///
/// Updates and deletes are sorted by identity so store requests are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainedBatch {
    /// Buttons to insert, each carrying its provisional identity.
    pub adds: Vec<Button>,
    /// Replacement payloads for committed buttons.
    pub updates: Vec<Button>,
    /// Committed identities to remove.
    pub deletes: Vec<ButtonId>,
}

impl DrainedBatch {
    /// True when the batch stages nothing.
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Total staged rows across all three operations.
    pub fn len(&self) -> usize {
        self.adds.len() + self.updates.len() + self.deletes.len()
    }
}

impl StagingBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages `button` for insertion, minting a provisional identity when
    /// `button.id == 0`. Returns the identity under which the add is tracked.
    pub fn stage_add(&mut self, mut button: Button) -> ButtonId {
        if button.id == 0 {
            self.next_provisional -= 1;
            button.id = self.next_provisional;
        }
        let id = button.id;
        self.pending_adds.push(button);
        id
    }

    /// Stages `button` as the replacement payload for `id`.
    ///
    /// A pending add with the same identity is rewritten in place (identity
    /// unchanged); a prior pending update is replaced; a pending delete is
    /// superseded by the update.
    pub fn stage_update(&mut self, id: ButtonId, mut button: Button) -> Result<(), StagingError> {
        if id == 0 {
            return Err(StagingError::UnsetIdentity);
        }
        button.id = id;

        if let Some(slot) = self.pending_adds.iter_mut().find(|b| b.id == id) {
            *slot = button;
            return Ok(());
        }

        self.pending_deletes.remove(&id);
        self.pending_updates.insert(id, button);
        Ok(())
    }

    /// Stages each identity in `ids` for deletion.
    ///
    /// A pending add is removed outright and never recorded as a delete; a
    /// pending update is dropped before the delete is recorded. The add check
    /// runs first because an add was never persisted.
    pub fn stage_deletes(&mut self, ids: &[ButtonId]) -> Result<(), StagingError> {
        if ids.contains(&0) {
            return Err(StagingError::UnsetIdentity);
        }

        for &id in ids {
            if let Some(pos) = self.pending_adds.iter().position(|b| b.id == id) {
                self.pending_adds.remove(pos);
            } else {
                self.pending_updates.remove(&id);
                self.pending_deletes.insert(id);
            }
        }
        Ok(())
    }

    /// Discards all pending changes. Irreversible; committed state is
    /// untouched.
    pub fn cancel(&mut self) {
        self.pending_adds.clear();
        self.pending_updates.clear();
        self.pending_deletes.clear();
    }

    /// Number of staged rows across all three operations.
    pub fn pending_count(&self) -> usize {
        self.pending_adds.len() + self.pending_updates.len() + self.pending_deletes.len()
    }

    /// True when nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.pending_count() == 0
    }

    /// Staged adds in staging order.
    pub fn pending_adds(&self) -> &[Button] {
        &self.pending_adds
    }

    /// Staged replacement payloads keyed by committed identity.
    pub fn pending_updates(&self) -> &HashMap<ButtonId, Button> {
        &self.pending_updates
    }

    /// Committed identities staged for deletion.
    pub fn pending_deletes(&self) -> &HashSet<ButtonId> {
        &self.pending_deletes
    }

    /// Merges the committed snapshot with the pending changes.
    ///
    /// Committed rows whose identity is staged for deletion or update are
    /// dropped, then pending updates (sorted by identity) and pending adds are
    /// appended. The snapshot itself is never mutated, and no identity
    /// appears twice in the result.
    pub fn materialized_view(&self, committed: &[Button]) -> Vec<Button> {
        let mut out: Vec<Button> = committed
            .iter()
            .filter(|b| {
                !self.pending_deletes.contains(&b.id) && !self.pending_updates.contains_key(&b.id)
            })
            .cloned()
            .collect();

        let mut updates: Vec<&Button> = self.pending_updates.values().collect();
        updates.sort_by_key(|b| b.id);
        out.extend(updates.into_iter().cloned());
        out.extend(self.pending_adds.iter().cloned());
        out
    }

    /// Reads and clears the buffer for one commit attempt.
    pub fn drain(&mut self) -> DrainedBatch {
        let adds = std::mem::take(&mut self.pending_adds);

        let mut updates: Vec<Button> = self.pending_updates.drain().map(|(_, b)| b).collect();
        updates.sort_by_key(|b| b.id);

        let mut deletes: Vec<ButtonId> = self.pending_deletes.drain().collect();
        deletes.sort_unstable();

        DrainedBatch {
            adds,
            updates,
            deletes,
        }
    }

    /// Reinstates a previously drained batch after a failed commit.
    ///
    /// The batch's collections are disjoint by construction, so direct
    /// reinsertion preserves the buffer invariant. Provisional identities are
    /// kept as minted.
    pub fn restore(&mut self, batch: DrainedBatch) {
        self.pending_adds.extend(batch.adds);
        for button in batch.updates {
            self.pending_updates.insert(button.id, button);
        }
        self.pending_deletes.extend(batch.deletes);
    }
}
