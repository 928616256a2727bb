//! Short-lived feedback messages keyed by item.
//!
//! Each message key owns at most one live timer. After every change the
//! timer registry is reconciled against the message map: keys without a
//! timer get one, timers whose key is gone are aborted.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct BoardState<K> {
    messages: HashMap<K, String>,
    timers: HashMap<K, Timer>,
    next_generation: u64,
    closed: bool,
}

impl<K> BoardState<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    fn reconcile(&mut self, board: &Arc<Mutex<BoardState<K>>>, display: Duration) {
        let messages = &self.messages;
        self.timers.retain(|key, timer| {
            let live = messages.contains_key(key);
            if !live {
                debug!(?key, "Dropping orphaned message timer");
                timer.handle.abort();
            }
            live
        });

        let unscheduled: Vec<K> = self
            .messages
            .keys()
            .filter(|key| !self.timers.contains_key(*key))
            .cloned()
            .collect();
        for key in unscheduled {
            let generation = self.next_generation;
            self.next_generation += 1;
            let handle = tokio::spawn(expire(
                Arc::downgrade(board),
                key.clone(),
                generation,
                display,
            ));
            self.timers.insert(key, Timer { generation, handle });
        }
    }
}

async fn expire<K>(board: Weak<Mutex<BoardState<K>>>, key: K, generation: u64, display: Duration)
where
    K: Eq + Hash + Debug,
{
    tokio::time::sleep(display).await;
    let Some(board) = board.upgrade() else {
        return;
    };
    let mut state = board.lock().unwrap_or_else(PoisonError::into_inner);
    if state.closed {
        return;
    }
    if state.timers.get(&key).map(|t| t.generation) == Some(generation) {
        state.timers.remove(&key);
        state.messages.remove(&key);
        debug!(?key, "Message expired");
    }
}

/// Per-item feedback messages that clear themselves after a fixed time.
///
/// Dropping the board (or calling [`MessageBoard::shutdown`]) aborts every
/// pending timer and leaves the message map as it was.
pub struct MessageBoard<K> {
    state: Arc<Mutex<BoardState<K>>>,
    display: Duration,
}

impl<K> MessageBoard<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    /// Timers are spawned on the current tokio runtime.
    pub fn new(display: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(BoardState {
                messages: HashMap::new(),
                timers: HashMap::new(),
                next_generation: 0,
                closed: false,
            })),
            display,
        }
    }

    /// Show `text` under `key`, replacing any message already there.
    ///
    /// A key that already has a live timer keeps it.
    pub fn post(&self, key: K, text: impl Into<String>) {
        self.post_all([(key, text.into())]);
    }

    /// Insert several messages, then reconcile once.
    pub fn post_all(&self, entries: impl IntoIterator<Item = (K, String)>) {
        let mut state = self.state();
        if state.closed {
            return;
        }
        state.messages.extend(entries);
        state.reconcile(&self.state, self.display);
    }

    /// Remove a message early; its timer is cancelled.
    pub fn dismiss(&self, key: &K) -> Option<String> {
        let mut state = self.state();
        if state.closed {
            return None;
        }
        let removed = state.messages.remove(key);
        state.reconcile(&self.state, self.display);
        removed
    }

    pub fn get(&self, key: &K) -> Option<String> {
        self.state().messages.get(key).cloned()
    }

    pub fn snapshot(&self) -> HashMap<K, String> {
        self.state().messages.clone()
    }

    pub fn live_timers(&self) -> usize {
        self.state().timers.len()
    }
}

impl<K> MessageBoard<K> {
    fn state(&self) -> MutexGuard<'_, BoardState<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Abort every pending timer. Later posts are ignored.
    pub fn shutdown(&self) {
        let mut state = self.state();
        state.closed = true;
        for (_, timer) in state.timers.drain() {
            timer.handle.abort();
        }
    }
}

impl<K> Drop for MessageBoard<K> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
