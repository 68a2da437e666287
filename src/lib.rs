//! Staged multi-edit sessions over screen/button configuration rows, with
//! atomic batch commit and live change notification.
//!
//! A screen owns an ordered collection of buttons. An interactive client
//! stages adds, updates, and deletes locally in a [`staging::StagingBuffer`],
//! then applies the whole batch as one all-or-nothing store transaction via
//! [`commit::CommitCoordinator`]. A [`listener::ChangeListener`] turns the
//! store's one-shot change watches into a continuous subscription by
//! re-arming after every delivered notice.
//!
//! # Examples
//!
//! Pure in-memory staging with [`staging::StagingBuffer`]:
//! ```
//! use screenstage::{
//!     button::{Button, ButtonAction},
//!     staging::StagingBuffer,
//! };
//!
//! let mut buf = StagingBuffer::new();
//! let id = buf.stage_add(Button::draft(1, "Acknowledge", 0, ButtonAction::ShowMessage {
//!     message: "Acknowledged".to_string(),
//!     dismissable: true,
//! }));
//! assert_eq!(id, -1);
//! assert_eq!(buf.pending_count(), 1);
//! ```
//!
//! Atomic commit against SQLite through an [`session::EditSession`]:
//! ```
//! use screenstage::{
//!     button::{Button, ButtonAction},
//!     session::EditSession,
//!     store::sqlite::SqliteButtonStore,
//! };
//!
//! let store = SqliteButtonStore::open_in_memory().expect("open sqlite");
//! let mut session = EditSession::new(7, store);
//! session.stage_add(Button::draft(7, "Report issue", 0, ButtonAction::Issue {
//!     issue_code: "E100".to_string(),
//!     requires_note: false,
//! }));
//! let result = session.commit().expect("commit");
//! assert!(result.success);
//! assert_eq!(result.outcomes.len(), 1);
//! ```
#![deny(missing_docs)]

/// Button domain record and behavior variants.
pub mod button;
/// Atomic batch commit coordination.
pub mod commit;
/// Change-notification listener and source capability.
pub mod listener;
/// Per-session composition root.
pub mod session;
/// Pending change set staging.
pub mod staging;
/// Storage capability and SQLite implementation.
pub mod store;
/// Shared primitive identifiers.
pub mod types;
