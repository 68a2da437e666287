//! Button domain record and its behavior variants.

use serde::{Deserialize, Serialize};

use crate::types::{ButtonId, ScreenId};

/// Behavior attached to a button press.
///
/// Exactly one variant's fields are populated; persistence code switches on
/// the discriminant explicitly rather than probing optional columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ButtonAction {
    /// Records an operational issue when pressed.
    Issue {
        /// Issue code filed by the press.
        issue_code: String,
        /// True when the operator must attach a note.
        requires_note: bool,
    },
    /// Shows a message to the operator when pressed.
    ShowMessage {
        /// Message body to display.
        message: String,
        /// True when the operator may dismiss the message.
        dismissable: bool,
    },
}

impl ButtonAction {
    /// Stable discriminant used by the store's `action_kind` column.
    pub fn kind_code(&self) -> i64 {
        match self {
            ButtonAction::Issue { .. } => 1,
            ButtonAction::ShowMessage { .. } => 2,
        }
    }
}

/// Editable button row belonging to one screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Button identity; `0` until staged, negative while provisional.
    pub id: ButtonId,
    /// Owning screen.
    pub screen_id: ScreenId,
    /// Operator-visible label, unique within the screen.
    pub label: String,
    /// Display ordering slot within the screen.
    pub position: u32,
    /// Behavior variant.
    pub action: ButtonAction,
}

impl Button {
    /// Constructs an unsaved button (`id == 0`) ready for staging.
    pub fn draft(
        screen_id: ScreenId,
        label: impl Into<String>,
        position: u32,
        action: ButtonAction,
    ) -> Self {
        Self {
            id: 0,
            screen_id,
            label: label.into(),
            position,
            action,
        }
    }
}
