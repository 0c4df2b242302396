//! Snapshot stream bridge
//!
//! `EntryStreamAdapter` subscribes to a push-based [`SnapshotSource`] and turns
//! every full snapshot (or failure) into exactly one published [`MoodView`].
//! Views are delivered on a Tokio `watch` channel, so late readers always see
//! the latest state.
//!
//! Each subscription runs as one Tokio task. The processor lives behind a
//! `parking_lot::Mutex` together with a generation counter; a worker only
//! applies and publishes while its generation is still current.

use crate::calendar::Calendar;
use crate::error::{MoodError, SourceError};
use crate::pipeline::{MoodProcessor, MoodView};
use crate::types::{DayKey, Entry, MonthKey};
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Buffer size of snapshot channels handed out by sources in this crate
pub const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;

/// One item of a snapshot stream
pub type SnapshotItem = Result<Vec<Entry>, SourceError>;

/// Which entries a subscription wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotQuery {
    All,
    Day(DayKey),
    /// Inclusive day range
    Range { from: DayKey, to: DayKey },
}

impl SnapshotQuery {
    pub fn matches(&self, day: DayKey) -> bool {
        match self {
            SnapshotQuery::All => true,
            SnapshotQuery::Day(key) => *key == day,
            SnapshotQuery::Range { from, to } => *from <= day && day <= *to,
        }
    }
}

/// Push-based provider of full entry snapshots.
///
/// Every item is the complete result set for the query, never a delta. The
/// consumer signals cancellation by dropping the receiver.
pub trait SnapshotSource: Send + Sync {
    fn subscribe(
        &self,
        query: SnapshotQuery,
        calendar: Arc<dyn Calendar>,
    ) -> mpsc::Receiver<SnapshotItem>;
}

struct Shared {
    processor: MoodProcessor,
    generation: u64,
}

struct Inner {
    state: Mutex<Shared>,
    views: watch::Sender<MoodView>,
}

impl Inner {
    /// Run `f` on the processor and publish the resulting view, under the lock
    fn update<R>(&self, f: impl FnOnce(&mut MoodProcessor) -> R) -> R {
        let mut state = self.state.lock();
        let result = f(&mut state.processor);
        self.views.send_replace(state.processor.view());
        result
    }

    /// Apply one snapshot item if `generation` is still current
    fn apply(&self, generation: u64, item: SnapshotItem) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        match item {
            Ok(entries) => state.processor.apply_snapshot(entries),
            Err(error) => state.processor.report_failure(&error),
        }
        self.views.send_replace(state.processor.view());
        true
    }
}

/// Bridges a [`SnapshotSource`] to a [`MoodProcessor`]
pub struct EntryStreamAdapter {
    inner: Arc<Inner>,
    worker: Option<JoinHandle<()>>,
}

impl EntryStreamAdapter {
    /// Wrap a processor; its current view is published immediately
    pub fn new(processor: MoodProcessor) -> Self {
        let (views, _) = watch::channel(processor.view());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(Shared {
                    processor,
                    generation: 0,
                }),
                views,
            }),
            worker: None,
        }
    }

    /// Receiver of published views
    pub fn views(&self) -> watch::Receiver<MoodView> {
        self.inner.views.subscribe()
    }

    /// Latest published view
    pub fn current_view(&self) -> MoodView {
        self.inner.views.borrow().clone()
    }

    /// Subscribe to `source`, cancelling any previous subscription first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe(
        &mut self,
        source: &dyn SnapshotSource,
        query: SnapshotQuery,
    ) -> Result<(), MoodError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MoodError::Runtime(e.to_string()))?;

        self.cancel();

        let (generation, calendar) = {
            let state = self.inner.state.lock();
            (state.generation, Arc::clone(state.processor.calendar()))
        };
        let mut receiver = source.subscribe(query, calendar);
        let inner = Arc::clone(&self.inner);

        info!("subscription {generation} started ({query:?})");
        self.worker = Some(runtime.spawn(async move {
            while let Some(item) = receiver.recv().await {
                if !inner.apply(generation, item) {
                    break;
                }
            }
            debug!("subscription {generation} finished");
        }));
        Ok(())
    }

    /// Cancel the active subscription. Idempotent.
    ///
    /// Once this returns, no snapshot from the cancelled subscription is
    /// published.
    pub fn cancel(&mut self) {
        {
            let mut state = self.inner.state.lock();
            state.generation += 1;
        }
        if let Some(worker) = &self.worker {
            if !worker.is_finished() {
                info!("subscription cancelled");
            }
            worker.abort();
        }
    }

    /// Cancel and wait for the worker to exit, releasing the upstream receiver
    pub async fn shutdown(&mut self) {
        self.cancel();
        if let Some(worker) = self.worker.take() {
            // A cancelled task reports a JoinError; nothing to recover
            let _ = worker.await;
        }
    }

    /// Add or replace one entry locally and publish
    pub fn insert_one(&self, entry: Entry) {
        self.inner.update(|p| p.insert_one(entry));
    }

    pub fn next_month(&self) {
        self.inner.update(MoodProcessor::next_month);
    }

    pub fn prev_month(&self) {
        self.inner.update(MoodProcessor::prev_month);
    }

    /// Jump to a month and publish; returns `false` when it is not reachable
    pub fn select_month(&self, month: MonthKey) -> bool {
        self.inner.update(|p| p.select_month(month))
    }
}

impl Drop for EntryStreamAdapter {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct Subscriber {
    query: SnapshotQuery,
    calendar: Arc<dyn Calendar>,
    sender: mpsc::Sender<SnapshotItem>,
}

impl Subscriber {
    fn snapshot(&self, entries: &[Entry]) -> Vec<Entry> {
        entries
            .iter()
            .filter(|e| self.query.matches(self.calendar.day_key(e.timestamp())))
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct MemoryState {
    entries: Vec<Entry>,
    subscribers: Vec<Subscriber>,
}

/// In-memory entry store that pushes a fresh snapshot to every subscriber on
/// each change. Used by the CLI `watch` command and in tests.
#[derive(Default)]
pub struct MemorySource {
    state: Mutex<MemoryState>,
}

impl MemorySource {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                entries,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Replace the stored entries and notify subscribers
    pub async fn replace_all(&self, entries: Vec<Entry>) {
        let pending = {
            let mut state = self.state.lock();
            state.entries = entries;
            Self::pending_snapshots(&mut state)
        };
        Self::deliver(pending).await;
    }

    /// Store one entry (replacing any entry with the same id) and notify
    pub async fn insert(&self, entry: Entry) {
        let pending = {
            let mut state = self.state.lock();
            state.entries.retain(|e| e.id() != entry.id());
            state.entries.push(entry);
            Self::pending_snapshots(&mut state)
        };
        Self::deliver(pending).await;
    }

    /// Push a failure to every subscriber
    pub async fn fail(&self, error: SourceError) {
        let pending: Vec<_> = {
            let mut state = self.state.lock();
            state.subscribers.retain(|s| !s.sender.is_closed());
            state
                .subscribers
                .iter()
                .map(|s| (s.sender.clone(), Err(error.clone())))
                .collect()
        };
        Self::deliver(pending).await;
    }

    /// Number of subscribers whose receiver is still alive
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state.subscribers.retain(|s| !s.sender.is_closed());
        state.subscribers.len()
    }

    fn pending_snapshots(
        state: &mut MemoryState,
    ) -> Vec<(mpsc::Sender<SnapshotItem>, SnapshotItem)> {
        state.subscribers.retain(|s| !s.sender.is_closed());
        state
            .subscribers
            .iter()
            .map(|s| (s.sender.clone(), Ok(s.snapshot(&state.entries))))
            .collect()
    }

    async fn deliver(pending: Vec<(mpsc::Sender<SnapshotItem>, SnapshotItem)>) {
        for (sender, item) in pending {
            // A closed receiver means the subscriber went away
            if sender.send(item).await.is_err() {
                debug!("dropping snapshot for a closed subscriber");
            }
        }
    }
}

impl SnapshotSource for MemorySource {
    fn subscribe(
        &self,
        query: SnapshotQuery,
        calendar: Arc<dyn Calendar>,
    ) -> mpsc::Receiver<SnapshotItem> {
        let (sender, receiver) = mpsc::channel(SNAPSHOT_CHANNEL_CAPACITY);
        let subscriber = Subscriber {
            query,
            calendar,
            sender,
        };

        let mut state = self.state.lock();
        // Fresh channel with free capacity; the initial snapshot always fits
        let _ = subscriber
            .sender
            .try_send(Ok(subscriber.snapshot(&state.entries)));
        state.subscribers.push(subscriber);
        receiver
    }
}
