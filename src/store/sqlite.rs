//! SQLite-backed button store with a change-notice broadcast feed.

use std::path::Path;

use hashbrown::HashSet;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{
    button::{Button, ButtonAction},
    listener::{
        events::{ChangeNotice, NoticeKind},
        source::ChannelNotificationSource,
    },
    types::{ButtonId, ScreenId},
};

use super::{ButtonStore, InsertOutcome, StoreResult, UpdateOutcome};

const ACTION_FORMAT_VERSION: u16 = 1;

/// Default bound on identities per delete statement, kept well under the
/// SQLite host-parameter limit.
const DELETE_CHUNK_LIMIT: usize = 500;

const CHANGE_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActionEnvelope {
    format_version: u16,
    action: ButtonAction,
}

impl ActionEnvelope {
    fn new(action: ButtonAction) -> Self {
        Self {
            format_version: ACTION_FORMAT_VERSION,
            action,
        }
    }
}

/// SQLite implementation of [`ButtonStore`].
///
/// Every transaction committed through [`ButtonStore::commit_txn`] publishes
/// one [`ChangeNotice`] per touched screen on a broadcast feed; adapt the feed
/// to a watchable capability with [`SqliteButtonStore::notifier`].
pub struct SqliteButtonStore {
    conn: Connection,
    changes: broadcast::Sender<ChangeNotice>,
    touched: HashSet<ScreenId>,
}

impl SqliteButtonStore {
    /// Opens or creates a store at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory store.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self {
            conn,
            changes,
            touched: HashSet::new(),
        })
    }

    /// Returns a [`ChannelNotificationSource`] over this store's change feed.
    pub fn notifier(&self) -> ChannelNotificationSource {
        ChannelNotificationSource::from_sender(self.changes.clone())
    }
}

impl ButtonStore for SqliteButtonStore {
    fn begin_txn(&mut self) -> StoreResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        self.touched.clear();
        Ok(())
    }

    fn commit_txn(&mut self) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT;")?;
        for screen_id in self.touched.drain() {
            // No receivers is fine; the feed is best-effort.
            let _ = self.changes.send(ChangeNotice {
                screen_id,
                button_id: None,
                kind: NoticeKind::Rowset,
            });
        }
        Ok(())
    }

    fn rollback_txn(&mut self) -> StoreResult<()> {
        self.conn.execute_batch("ROLLBACK;")?;
        self.touched.clear();
        Ok(())
    }

    fn batch_insert(
        &mut self,
        screen_id: ScreenId,
        rows: &[Button],
    ) -> StoreResult<Vec<InsertOutcome>> {
        self.touched.insert(screen_id);

        let mut out = Vec::with_capacity(rows.len());
        let mut stmt = self.conn.prepare(
            "INSERT INTO buttons(screen_id, label, position, action_kind, action_payload) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;

        for button in rows {
            let payload = serde_json::to_vec(&ActionEnvelope::new(button.action.clone()))?;
            match stmt.execute(params![
                screen_id as i64,
                button.label,
                button.position,
                button.action.kind_code(),
                payload,
            ]) {
                Ok(_) => out.push(InsertOutcome {
                    provisional_id: button.id,
                    success: true,
                    assigned_id: Some(self.conn.last_insert_rowid()),
                    error: None,
                }),
                Err(err) => out.push(InsertOutcome {
                    provisional_id: button.id,
                    success: false,
                    assigned_id: None,
                    error: Some(err.to_string()),
                }),
            }
        }
        Ok(out)
    }

    fn batch_update(
        &mut self,
        screen_id: ScreenId,
        rows: &[Button],
    ) -> StoreResult<Vec<UpdateOutcome>> {
        self.touched.insert(screen_id);

        let mut out = Vec::with_capacity(rows.len());
        let mut stmt = self.conn.prepare(
            "UPDATE buttons SET label = ?1, position = ?2, action_kind = ?3, action_payload = ?4 \
             WHERE id = ?5 AND screen_id = ?6",
        )?;

        for button in rows {
            let payload = serde_json::to_vec(&ActionEnvelope::new(button.action.clone()))?;
            match stmt.execute(params![
                button.label,
                button.position,
                button.action.kind_code(),
                payload,
                button.id,
                screen_id as i64,
            ]) {
                Ok(0) => out.push(UpdateOutcome {
                    id: button.id,
                    success: false,
                    error: Some(format!("no button {} on screen {screen_id}", button.id)),
                }),
                Ok(_) => out.push(UpdateOutcome {
                    id: button.id,
                    success: true,
                    error: None,
                }),
                Err(err) => out.push(UpdateOutcome {
                    id: button.id,
                    success: false,
                    error: Some(err.to_string()),
                }),
            }
        }
        Ok(out)
    }

    fn batch_delete(&mut self, screen_id: ScreenId, ids: &[ButtonId]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.touched.insert(screen_id);

        let mut sql = String::from("DELETE FROM buttons WHERE screen_id = ?1 AND id IN (");
        for i in 0..ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&format!("?{}", i + 2));
        }
        sql.push(')');

        let mut stmt = self.conn.prepare(&sql)?;
        let count = stmt.execute(params_from_iter(
            std::iter::once(screen_id as i64).chain(ids.iter().copied()),
        ))?;
        Ok(count)
    }

    fn query_screen(&self, screen_id: ScreenId) -> StoreResult<Vec<Button>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, label, position, action_payload FROM buttons \
             WHERE screen_id = ?1 ORDER BY position ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![screen_id as i64], |row| {
            row_to_button(screen_id, row)
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn query_button(&self, screen_id: ScreenId, id: ButtonId) -> StoreResult<Option<Button>> {
        let button = self
            .conn
            .query_row(
                "SELECT id, label, position, action_payload FROM buttons \
                 WHERE screen_id = ?1 AND id = ?2",
                params![screen_id as i64, id],
                |row| row_to_button(screen_id, row),
            )
            .optional()?;
        Ok(button)
    }

    fn delete_chunk_limit(&self) -> usize {
        DELETE_CHUNK_LIMIT
    }
}

fn row_to_button(screen_id: ScreenId, row: &rusqlite::Row<'_>) -> rusqlite::Result<Button> {
    let id: i64 = row.get(0)?;
    let label: String = row.get(1)?;
    let position: u32 = row.get(2)?;
    let payload: Vec<u8> = row.get(3)?;
    let action = decode_action_payload(&payload).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            payload.len(),
            rusqlite::types::Type::Blob,
            Box::new(std::io::Error::other(err)),
        )
    })?;
    Ok(Button {
        id,
        screen_id,
        label,
        position,
        action,
    })
}

fn decode_action_payload(payload: &[u8]) -> Result<ButtonAction, String> {
    let envelope: ActionEnvelope = serde_json::from_slice(payload)
        .map_err(|e| format!("action payload decode failed: {e}"))?;
    if envelope.format_version != ACTION_FORMAT_VERSION {
        return Err(format!(
            "unsupported action format version: {}",
            envelope.format_version
        ));
    }
    Ok(envelope.action)
}
