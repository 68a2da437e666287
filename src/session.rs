//! Per-session composition of staging, commit, and live refresh.

use crate::{
    button::Button,
    commit::{CommitCoordinator, CommitError, CommitResult},
    listener::ChangeListener,
    staging::{StagingBuffer, StagingError},
    store::{ButtonStore, StoreError},
    types::{ButtonId, ScreenId},
};

/// One user's edit session over a single screen.
///
/// Owns a [`StagingBuffer`] and a [`CommitCoordinator`], plus an optional
/// [`ChangeListener`] for live refresh. A failed commit leaves the buffer
/// exactly as staged so the user can fix the flagged rows and retry.
pub struct EditSession<S: ButtonStore> {
    screen_id: ScreenId,
    buffer: StagingBuffer,
    coordinator: CommitCoordinator<S>,
    listener: Option<ChangeListener>,
}

impl<S: ButtonStore> EditSession<S> {
    /// Opens a session editing `screen_id` against `store`.
    pub fn new(screen_id: ScreenId, store: S) -> Self {
        Self {
            screen_id,
            buffer: StagingBuffer::new(),
            coordinator: CommitCoordinator::new(store),
            listener: None,
        }
    }

    /// Screen this session edits.
    pub fn screen_id(&self) -> ScreenId {
        self.screen_id
    }

    /// Stages a new button; returns its tracking identity.
    pub fn stage_add(&mut self, mut button: Button) -> ButtonId {
        button.screen_id = self.screen_id;
        self.buffer.stage_add(button)
    }

    /// Stages a replacement payload for `id`.
    pub fn stage_update(&mut self, id: ButtonId, mut button: Button) -> Result<(), StagingError> {
        button.screen_id = self.screen_id;
        self.buffer.stage_update(id, button)
    }

    /// Stages deletions for `ids`.
    pub fn stage_deletes(&mut self, ids: &[ButtonId]) -> Result<(), StagingError> {
        self.buffer.stage_deletes(ids)
    }

    /// Discards all staged changes.
    pub fn cancel(&mut self) {
        self.buffer.cancel();
    }

    /// Number of staged rows.
    pub fn pending_count(&self) -> usize {
        self.buffer.pending_count()
    }

    /// The session's staging buffer.
    pub fn buffer(&self) -> &StagingBuffer {
        &self.buffer
    }

    /// Commits everything staged as one transaction.
    ///
    /// On success the buffer is drained. On a transactional failure
    /// (`success == false`) or a total failure (`Err`) the staged changes are
    /// reinstated unchanged, so [`pending_count`](EditSession::pending_count)
    /// is the same as before the attempt.
    pub fn commit(&mut self) -> Result<CommitResult, CommitError> {
        let batch = self.buffer.drain();
        match self.coordinator.commit(self.screen_id, &batch) {
            Ok(result) => {
                if !result.success {
                    self.buffer.restore(batch);
                }
                Ok(result)
            }
            Err(err) => {
                self.buffer.restore(batch);
                Err(err)
            }
        }
    }

    /// Committed rows merged with the pending changes.
    pub fn view(&self) -> Result<Vec<Button>, StoreError> {
        let committed = self.coordinator.store().query_screen(self.screen_id)?;
        Ok(self.buffer.materialized_view(&committed))
    }

    /// Attaches a live-refresh listener. Replaces any prior one; the old
    /// listener's task is aborted on drop.
    pub fn attach_listener(&mut self, listener: ChangeListener) {
        self.listener = Some(listener);
    }

    /// The attached listener, if any.
    pub fn listener(&self) -> Option<&ChangeListener> {
        self.listener.as_ref()
    }

    /// Exclusive access to the attached listener, for start/stop.
    pub fn listener_mut(&mut self) -> Option<&mut ChangeListener> {
        self.listener.as_mut()
    }

    /// Shared access to the store, for reads outside the commit path.
    pub fn store(&self) -> &S {
        self.coordinator.store()
    }
}
