//! Continuous change subscription over a one-shot notification primitive.

/// Watch filters, change notices, and listener states.
pub mod events;
/// Listener state machine and callback fan-out.
pub mod handle;
/// Notification source capability and broadcast-backed implementation.
pub mod source;

pub use events::{ChangeNotice, ListenerState, NoticeKind, WatchFilter};
pub use handle::ChangeListener;
pub use source::{ChannelNotificationSource, NotificationSource, WatchError};
