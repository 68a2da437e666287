use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};

use screenstage::listener::{
    ChangeListener, ChangeNotice, ChannelNotificationSource, ListenerState, NoticeKind,
    NotificationSource, WatchError, WatchFilter,
};

const SCREEN: u64 = 1;

fn rowset(screen_id: u64) -> ChangeNotice {
    ChangeNotice {
        screen_id,
        button_id: None,
        kind: NoticeKind::Rowset,
    }
}

fn invalidated(screen_id: u64) -> ChangeNotice {
    ChangeNotice {
        screen_id,
        button_id: None,
        kind: NoticeKind::Invalidated,
    }
}

/// Hand-driven source: every watch parks a oneshot sender the test can fire,
/// and registration attempts are counted. `fail_on` makes the n-th watch call
/// (0-based) fail.
#[derive(Default)]
struct ScriptedSource {
    registrations: Mutex<Vec<oneshot::Sender<ChangeNotice>>>,
    watch_calls: AtomicUsize,
    fail_on: Mutex<Option<usize>>,
}

impl ScriptedSource {
    fn failing_on(call: usize) -> Self {
        Self {
            fail_on: Mutex::new(Some(call)),
            ..Self::default()
        }
    }

    fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    fn fire(&self, notice: ChangeNotice) {
        let sender = self.registrations.lock().unwrap().remove(0);
        sender.send(notice).expect("registration alive");
    }
}

impl NotificationSource for ScriptedSource {
    fn watch(&self, _filter: &WatchFilter) -> Result<oneshot::Receiver<ChangeNotice>, WatchError> {
        let call = self.watch_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_on.lock().unwrap() == Some(call) {
            return Err(WatchError::Message("registration rejected".to_string()));
        }
        let (tx, rx) = oneshot::channel();
        self.registrations.lock().unwrap().push(tx);
        Ok(rx)
    }
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let waited = timeout(Duration::from_secs(2), async {
        while !cond() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for: {what}");
}

#[tokio::test]
async fn notices_fan_out_in_subscription_order_and_rearm() {
    let source = Arc::new(ScriptedSource::default());
    let mut listener = ChangeListener::new(source.clone(), WatchFilter::screen(SCREEN));

    let seen = Arc::new(Mutex::new(Vec::<(&'static str, u64)>::new()));
    let first = Arc::clone(&seen);
    listener.subscribe(move |n| first.lock().unwrap().push(("first", n.screen_id)));
    let second = Arc::clone(&seen);
    listener.subscribe(move |n| second.lock().unwrap().push(("second", n.screen_id)));

    listener.start().expect("start");
    assert_eq!(listener.state(), ListenerState::Started);
    assert_eq!(source.watch_calls(), 1);

    source.fire(rowset(SCREEN));
    wait_until("re-arm after first notice", || source.watch_calls() == 2).await;
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[("first", SCREEN), ("second", SCREEN)]
    );

    source.fire(rowset(SCREEN));
    wait_until("re-arm after second notice", || source.watch_calls() == 3).await;
    assert_eq!(seen.lock().unwrap().len(), 4);
    assert!(listener.is_live());
}

#[tokio::test]
async fn rearms_even_with_zero_callbacks() {
    let source = Arc::new(ScriptedSource::default());
    let mut listener = ChangeListener::new(source.clone(), WatchFilter::screen(SCREEN));

    listener.start().expect("start");
    source.fire(rowset(SCREEN));
    wait_until("re-arm with no subscribers", || source.watch_calls() == 2).await;
    assert!(listener.is_live());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_callback_blocks_neither_fanout_nor_rearm() {
    let source = Arc::new(ScriptedSource::default());
    let mut listener = ChangeListener::new(source.clone(), WatchFilter::screen(SCREEN));

    listener.subscribe(|_| panic!("broken callback"));
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    listener.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    listener.start().expect("start");
    source.fire(rowset(SCREEN));

    wait_until("re-arm after panic", || source.watch_calls() == 2).await;
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
    assert!(listener.is_live());
}

#[tokio::test]
async fn invalidated_notice_stops_rearming() {
    let source = Arc::new(ScriptedSource::default());
    let mut listener = ChangeListener::new(source.clone(), WatchFilter::screen(SCREEN));

    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    listener.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    listener.start().expect("start");
    source.fire(invalidated(SCREEN));

    wait_until("invalidation delivered", || {
        delivered.load(Ordering::SeqCst) == 1
    })
    .await;
    wait_until("listener goes dead", || !listener.is_live()).await;

    // The invalidated subscription was not re-armed.
    assert_eq!(source.watch_calls(), 1);
    // Dead-but-started until an explicit stop/start cycle.
    assert_eq!(listener.state(), ListenerState::Started);
}

#[tokio::test]
async fn rearm_failure_leaves_dead_but_started_until_restart() {
    let source = Arc::new(ScriptedSource::failing_on(1));
    let mut listener = ChangeListener::new(source.clone(), WatchFilter::screen(SCREEN));

    listener.start().expect("start");
    source.fire(rowset(SCREEN));

    wait_until("re-arm attempted once", || source.watch_calls() == 2).await;
    wait_until("listener goes dead", || !listener.is_live()).await;
    assert_eq!(listener.state(), ListenerState::Started);

    listener.stop();
    assert_eq!(listener.state(), ListenerState::Stopped);
    listener.start().expect("restart");
    assert!(listener.is_live());
    assert_eq!(source.watch_calls(), 3);
}

#[tokio::test]
async fn start_is_idempotent_when_started() {
    let source = Arc::new(ScriptedSource::default());
    let mut listener = ChangeListener::new(source.clone(), WatchFilter::screen(SCREEN));

    listener.start().expect("start");
    listener.start().expect("second start is a no-op");
    assert_eq!(source.watch_calls(), 1);
}

#[tokio::test]
async fn failed_start_stays_stopped() {
    let source = Arc::new(ScriptedSource::failing_on(0));
    let mut listener = ChangeListener::new(source.clone(), WatchFilter::screen(SCREEN));

    assert!(listener.start().is_err());
    assert_eq!(listener.state(), ListenerState::Stopped);
    assert!(!listener.is_live());
}

#[tokio::test]
async fn stop_is_idempotent_and_never_touches_the_source() {
    let source = Arc::new(ScriptedSource::default());
    let mut listener = ChangeListener::new(source.clone(), WatchFilter::screen(SCREEN));

    listener.stop();
    listener.stop();
    assert_eq!(listener.state(), ListenerState::Stopped);
    assert_eq!(source.watch_calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_is_safe_while_a_notification_is_in_flight() {
    let source = Arc::new(ScriptedSource::default());
    let mut listener = ChangeListener::new(source.clone(), WatchFilter::screen(SCREEN));

    let (entered_tx, entered_rx) = std::sync::mpsc::channel::<()>();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    listener.subscribe(move |_| {
        entered_tx.send(()).unwrap();
        release_rx.lock().unwrap().recv().unwrap();
    });

    listener.start().expect("start");
    source.fire(rowset(SCREEN));

    // Wait until the callback is mid-execution, then stop underneath it.
    entered_rx.recv_timeout(Duration::from_secs(2)).expect("callback entered");
    listener.stop();
    assert_eq!(listener.state(), ListenerState::Stopped);
    release_tx.send(()).unwrap();

    // The in-flight task winds down without crashing anything.
    sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn channel_source_delivers_only_matching_notices() {
    let source = ChannelNotificationSource::new(16);

    let registration = source.watch(&WatchFilter::screen(SCREEN)).expect("watch");
    source.publish(rowset(99));
    source.publish(rowset(SCREEN));

    let notice = timeout(Duration::from_secs(2), registration)
        .await
        .expect("delivery")
        .expect("registration alive");
    assert_eq!(notice.screen_id, SCREEN);

    // One-shot: a second delivery needs a fresh watch.
    let narrow = source.watch(&WatchFilter::button(SCREEN, 4)).expect("watch");
    source.publish(ChangeNotice {
        screen_id: SCREEN,
        button_id: Some(9),
        kind: NoticeKind::Rowset,
    });
    source.publish(ChangeNotice {
        screen_id: SCREEN,
        button_id: Some(4),
        kind: NoticeKind::Rowset,
    });
    let notice = timeout(Duration::from_secs(2), narrow)
        .await
        .expect("delivery")
        .expect("registration alive");
    assert_eq!(notice.button_id, Some(4));
}
