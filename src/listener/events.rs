//! Watch filters and change-notice payloads.

use crate::types::{ButtonId, ScreenId};

/// Row filter a subscription watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchFilter {
    /// Parent scope every matching change belongs to.
    pub screen_id: ScreenId,
    /// Narrows the watch to one button when set.
    pub button_id: Option<ButtonId>,
}

impl WatchFilter {
    /// Watches every button of `screen_id`.
    pub fn screen(screen_id: ScreenId) -> Self {
        Self {
            screen_id,
            button_id: None,
        }
    }

    /// Watches a single button of `screen_id`.
    pub fn button(screen_id: ScreenId, button_id: ButtonId) -> Self {
        Self {
            screen_id,
            button_id: Some(button_id),
        }
    }

    /// True when `notice` falls inside this filter.
    ///
    /// A whole-screen notice (`button_id == None`) matches every button-level
    /// filter on that screen.
    pub fn matches(&self, notice: &ChangeNotice) -> bool {
        if notice.screen_id != self.screen_id {
            return false;
        }
        match (self.button_id, notice.button_id) {
            (Some(want), Some(got)) => want == got,
            _ => true,
        }
    }
}

/// Classification of a delivered notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Rows matching the watched filter changed.
    Rowset,
    /// The subscription itself is no longer valid; re-arming is pointless.
    Invalidated,
}

/// One change event delivered by a notification source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    /// Screen whose rows changed.
    pub screen_id: ScreenId,
    /// Specific button that changed, when known.
    pub button_id: Option<ButtonId>,
    /// Notice classification.
    pub kind: NoticeKind,
}

/// Lifecycle states of a [`crate::listener::ChangeListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// No subscription outstanding.
    Stopped,
    /// First registration in progress.
    Starting,
    /// Subscription registered; re-armed after every delivery.
    Started,
    /// Shutdown in progress.
    Stopping,
}
