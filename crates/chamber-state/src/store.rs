// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Snapshot store with coalesced change notifications.
//!
//! Every update produces a fresh [`AppState`] and swaps it in atomically;
//! snapshots handed out earlier are never touched. Subscribers run on a
//! notifier task after the updates of a synchronous burst have all been
//! applied, receiving the latest snapshot plus the coalesced set of changed
//! domains, in registration order. A panicking subscriber is logged and the
//! rest still run.

use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use arc_swap::ArcSwap;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error};

use crate::domains::{AppState, DataState, Domain, Personality};
use chamber_core::{ListenerProfile, StreamRecord};

type SubscriberFn = dyn Fn(&AppState, &[Domain]) + Send + Sync;

struct Subscriber {
    id: u64,
    callback: Arc<SubscriberFn>,
}

/// Handle returned by [`StateStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct StoreInner {
    current: ArcSwap<AppState>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    changes_tx: mpsc::UnboundedSender<Domain>,
}

/// Single source of truth for app state.
///
/// Cheap to clone; all clones share the same state. Must be created inside
/// a Tokio runtime, which hosts the notifier task.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StoreInner>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::with_initial(AppState::default())
    }

    /// Start from a prepared state instead of the defaults.
    pub fn with_initial(initial: AppState) -> Self {
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(StoreInner {
            current: ArcSwap::from_pointee(initial),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            changes_tx,
        });
        tokio::spawn(notifier_loop(Arc::downgrade(&inner), changes_rx));
        Self { inner }
    }

    /// Current snapshot. Immutable; later updates never alter it.
    pub fn snapshot(&self) -> Arc<AppState> {
        self.inner.current.load_full()
    }

    /// Apply a mutation to one domain and swap in the resulting snapshot.
    ///
    /// The mutator may run more than once when updates race, so it must be
    /// idempotent over its captures.
    pub fn update(&self, domain: Domain, mutate: impl Fn(&mut AppState)) {
        self.inner.current.rcu(|current| {
            let mut next = AppState::clone(current);
            mutate(&mut next);
            next
        });
        let _ = self.inner.changes_tx.send(domain);
    }

    /// Register a change callback. Callbacks run in registration order.
    pub fn subscribe(
        &self,
        callback: impl Fn(&AppState, &[Domain]) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_subscribers().push(Subscriber {
            id,
            callback: Arc::new(callback),
        });
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.lock_subscribers().retain(|s| s.id != id.0);
    }

    /// Deep clone of the dataset readers should consult, demo or real.
    pub fn active_data(&self) -> DataState {
        self.snapshot().active_data().clone()
    }

    pub fn set_view(&self, view: impl Into<String>) {
        let view = view.into();
        self.update(Domain::View, move |s| s.view.current = view.clone());
    }

    pub fn set_streams(&self, streams: Vec<StreamRecord>) {
        self.update(Domain::Data, move |s| s.data.streams = streams.clone());
    }

    pub fn set_profile(&self, profile: ListenerProfile) {
        self.update(Domain::Data, move |s| s.data.profile = Some(profile.clone()));
    }

    pub fn set_personality(&self, name: impl Into<String>, emoji: impl Into<String>) {
        let personality = Personality {
            name: name.into(),
            emoji: emoji.into(),
        };
        self.update(Domain::Data, move |s| {
            s.data.personality = Some(personality.clone())
        });
    }

    pub fn set_lite_mode(&self, on: bool) {
        self.update(Domain::Lite, move |s| s.lite.is_lite_mode = on);
    }

    pub fn set_demo_mode(&self, on: bool) {
        self.update(Domain::Demo, move |s| s.demo.is_demo_mode = on);
    }

    pub fn set_turn_in_flight(&self, on: bool) {
        self.update(Domain::Operations, move |s| s.operations.turn_in_flight = on);
    }

    pub fn set_queued_turns(&self, count: usize) {
        self.update(Domain::Operations, move |s| s.operations.queued_turns = count);
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drains change marks and delivers coalesced notifications.
///
/// Holds only a weak reference so dropping the last store clone shuts the
/// task down. Delivery happens outside the subscriber lock, so callbacks
/// may subscribe or unsubscribe freely.
async fn notifier_loop(inner: Weak<StoreInner>, mut changes_rx: UnboundedReceiver<Domain>) {
    while let Some(first) = changes_rx.recv().await {
        // Let the burst that queued this mark finish before delivering.
        tokio::task::yield_now().await;

        let mut changed = BTreeSet::from([first]);
        while let Ok(more) = changes_rx.try_recv() {
            changed.insert(more);
        }
        let changed: Vec<Domain> = changed.into_iter().collect();

        let Some(store) = inner.upgrade() else {
            break;
        };
        let snapshot = store.current.load_full();
        let subscribers: Vec<Subscriber> = store
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| Subscriber {
                id: s.id,
                callback: Arc::clone(&s.callback),
            })
            .collect();
        drop(store);

        debug!(domains = ?changed, subscribers = subscribers.len(), "state changed");
        for subscriber in subscribers {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                (subscriber.callback)(&snapshot, &changed)
            }));
            if outcome.is_err() {
                error!(subscriber = subscriber.id, "state subscriber panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;
    use tokio::time::timeout;

    type Notification = (Arc<AppState>, Vec<Domain>);

    fn forwarding_subscriber(
        store: &StateStore,
    ) -> (SubscriptionId, UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = store.subscribe(move |state, changed| {
            let _ = tx.send((Arc::new(state.clone()), changed.to_vec()));
        });
        (id, rx)
    }

    async fn next_notification(rx: &mut UnboundedReceiver<Notification>) -> Notification {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("notification should arrive")
            .expect("notifier should be running")
    }

    fn record(artist: &str) -> StreamRecord {
        StreamRecord {
            ts: chrono::DateTime::UNIX_EPOCH,
            artist: artist.to_string(),
            track: "Track".to_string(),
            ms_played: 60_000,
        }
    }

    #[tokio::test]
    async fn updates_swap_in_a_new_snapshot() {
        let store = StateStore::new();
        store.set_lite_mode(true);
        assert!(store.snapshot().lite.is_lite_mode);
    }

    #[tokio::test]
    async fn earlier_snapshots_are_unaffected_by_updates() {
        let store = StateStore::new();
        store.set_view("settings");

        let before = store.snapshot();
        let frozen = AppState::clone(&before);

        store.set_view("upload");
        store.set_lite_mode(true);

        assert_eq!(*before, frozen);
        assert_eq!(store.snapshot().view.current, "upload");
    }

    #[tokio::test]
    async fn synchronous_bursts_coalesce_into_one_notification() {
        let store = StateStore::new();
        let (_id, mut rx) = forwarding_subscriber(&store);

        store.set_view("upload");
        store.set_streams(vec![record("Deftones")]);
        store.set_view("chat");

        let (state, changed) = next_notification(&mut rx).await;
        assert_eq!(changed, vec![Domain::View, Domain::Data]);
        assert_eq!(state.view.current, "chat");
        assert_eq!(state.data.streams.len(), 1);
    }

    #[tokio::test]
    async fn subscribers_run_in_registration_order() {
        let store = StateStore::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            store.subscribe(move |_, _| order.lock().unwrap().push(name));
        }
        let (_id, mut rx) = forwarding_subscriber(&store);

        store.set_lite_mode(true);
        next_notification(&mut rx).await;

        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn panicking_subscriber_does_not_stop_the_rest() {
        let store = StateStore::new();
        store.subscribe(|_, _| panic!("boom"));
        let (_id, mut rx) = forwarding_subscriber(&store);

        store.set_demo_mode(true);
        let (state, changed) = next_notification(&mut rx).await;
        assert!(state.demo.is_demo_mode);
        assert_eq!(changed, vec![Domain::Demo]);

        // The notifier survived and keeps delivering.
        store.set_lite_mode(true);
        let (_, changed) = next_notification(&mut rx).await;
        assert_eq!(changed, vec![Domain::Lite]);
    }

    #[tokio::test]
    async fn unsubscribed_callbacks_stop_receiving() {
        let store = StateStore::new();
        let (first_id, mut first_rx) = forwarding_subscriber(&store);
        let (_second_id, mut second_rx) = forwarding_subscriber(&store);

        store.set_lite_mode(true);
        next_notification(&mut first_rx).await;
        next_notification(&mut second_rx).await;

        store.unsubscribe(first_id);
        store.set_lite_mode(false);
        next_notification(&mut second_rx).await;
        assert!(
            first_rx.try_recv().is_err(),
            "unsubscribed callback should not fire"
        );
    }

    #[tokio::test]
    async fn active_data_clone_cannot_mutate_the_store() {
        let store = StateStore::new();
        store.set_streams(vec![record("Deftones")]);

        let mut copy = store.active_data();
        copy.streams.clear();
        copy.profile = Some(ListenerProfile::default());

        assert_eq!(store.snapshot().data.streams.len(), 1);
        assert!(store.snapshot().data.profile.is_none());
    }

    #[tokio::test]
    async fn active_data_switches_with_demo_mode() {
        let store = StateStore::new();
        store.set_streams(vec![record("Deftones")]);
        store.update(Domain::Demo, |s| {
            s.demo.data.streams = vec![record("Demo Artist")]
        });

        assert_eq!(store.active_data().streams[0].artist, "Deftones");
        store.set_demo_mode(true);
        assert_eq!(store.active_data().streams[0].artist, "Demo Artist");
    }

    #[tokio::test]
    async fn notification_carries_the_snapshot_at_delivery_time() {
        let store = StateStore::new();
        let (_id, mut rx) = forwarding_subscriber(&store);

        store.set_view("upload");
        store.set_view("settings");

        let (state, _) = next_notification(&mut rx).await;
        assert_eq!(state.view.current, "settings");
    }
}
