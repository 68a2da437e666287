//! Change listener: one live subscription, eagerly re-armed per delivery.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::warn;

use super::{
    events::{ChangeNotice, ListenerState, NoticeKind, WatchFilter},
    source::{NotificationSource, WatchError},
};

type Callback = Box<dyn Fn(&ChangeNotice) + Send + Sync + 'static>;

/// Continuous subscription built on a one-shot [`NotificationSource`].
///
/// At most one registration is outstanding at a time. Every delivered notice
/// is fanned out to the subscribed callbacks in registration order and then,
/// unless the notice marks the subscription invalid, the watch is re-issued
/// before the next delivery can be missed. Callbacks run on a task owned by
/// the listener, never on the caller's thread.
///
/// When re-registration fails the listener stays `Started` but goes dead
/// ([`is_live`](ChangeListener::is_live) returns false); recovery is an
/// explicit [`stop`](ChangeListener::stop) + [`start`](ChangeListener::start)
/// cycle.
pub struct ChangeListener {
    source: Arc<dyn NotificationSource>,
    filter: WatchFilter,
    callbacks: Arc<Mutex<Vec<Callback>>>,
    live: Arc<AtomicBool>,
    state: ListenerState,
    task: Option<JoinHandle<()>>,
}

impl ChangeListener {
    /// Creates a stopped listener over `source` watching `filter`.
    pub fn new(source: Arc<dyn NotificationSource>, filter: WatchFilter) -> Self {
        Self {
            source,
            filter,
            callbacks: Arc::new(Mutex::new(Vec::new())),
            live: Arc::new(AtomicBool::new(false)),
            state: ListenerState::Stopped,
            task: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// True when started and the subscription is still being re-armed.
    pub fn is_live(&self) -> bool {
        self.state == ListenerState::Started && self.live.load(Ordering::SeqCst)
    }

    /// Appends `callback` to the fan-out list.
    ///
    /// Callbacks accumulate and are invoked in registration order on every
    /// notice; there is no unsubscribe.
    pub fn subscribe(&self, callback: impl Fn(&ChangeNotice) + Send + Sync + 'static) {
        let mut callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        callbacks.push(Box::new(callback));
    }

    /// Registers the first watch and spawns the delivery task.
    ///
    /// No-op success when already started. On registration failure the
    /// listener stays stopped. Must be called within a tokio runtime.
    pub fn start(&mut self) -> Result<(), WatchError> {
        if self.state == ListenerState::Started {
            return Ok(());
        }
        self.state = ListenerState::Starting;

        match self.source.watch(&self.filter) {
            Ok(registration) => {
                self.live.store(true, Ordering::SeqCst);
                self.task = Some(tokio::spawn(watch_loop(
                    registration,
                    Arc::clone(&self.source),
                    self.filter.clone(),
                    Arc::clone(&self.callbacks),
                    Arc::clone(&self.live),
                )));
                self.state = ListenerState::Started;
                Ok(())
            }
            Err(err) => {
                self.state = ListenerState::Stopped;
                Err(err)
            }
        }
    }

    /// Cancels the outstanding registration and stops the delivery task.
    ///
    /// No-op when already stopped. Safe to call while a notification is in
    /// flight; in-flight callbacks finish on their own task and are not waited
    /// for.
    pub fn stop(&mut self) {
        if self.state == ListenerState::Stopped {
            return;
        }
        self.state = ListenerState::Stopping;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.live.store(false, Ordering::SeqCst);
        self.state = ListenerState::Stopped;
    }
}

impl Drop for ChangeListener {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn watch_loop(
    registration: oneshot::Receiver<ChangeNotice>,
    source: Arc<dyn NotificationSource>,
    filter: WatchFilter,
    callbacks: Arc<Mutex<Vec<Callback>>>,
    live: Arc<AtomicBool>,
) {
    let mut pending = registration;

    loop {
        let notice = match pending.await {
            Ok(notice) => notice,
            Err(_) => {
                warn!("notification source dropped the registration; listener is dead until restarted");
                live.store(false, Ordering::SeqCst);
                return;
            }
        };

        // Dispatch first, then re-arm; both happen here so there is no
        // caller-visible gap, and re-arming never depends on callback outcomes.
        dispatch(&callbacks, &notice);

        if notice.kind == NoticeKind::Invalidated {
            warn!(
                screen_id = notice.screen_id,
                "subscription invalidated; listener is dead until restarted"
            );
            live.store(false, Ordering::SeqCst);
            return;
        }

        pending = match source.watch(&filter) {
            Ok(next) => next,
            Err(err) => {
                warn!(error = %err, "re-registration failed; listener is dead until restarted");
                live.store(false, Ordering::SeqCst);
                return;
            }
        };
    }
}

fn dispatch(callbacks: &Mutex<Vec<Callback>>, notice: &ChangeNotice) {
    let callbacks = callbacks.lock().unwrap_or_else(PoisonError::into_inner);
    for callback in callbacks.iter() {
        if catch_unwind(AssertUnwindSafe(|| callback(notice))).is_err() {
            warn!("change callback panicked; continuing fan-out");
        }
    }
}
