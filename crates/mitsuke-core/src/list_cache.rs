//! Per-user list cache.
//!
//! One actor task owns every slot. Callers talk to it through a cloneable
//! [`ListCacheHandle`]; commands are applied one at a time in arrival
//! order, so a functional update always sees the latest slot state.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::error::MitsukeError;
use crate::models::{ListEntryView, ListRecord, MalId, Session, UserId};

/// Functional update over a slot's records.
pub type RecordsFn = Box<dyn FnOnce(Option<Vec<ListRecord>>) -> Vec<ListRecord> + Send>;

/// In-place edit of already-fetched records.
pub type ModifyFn = Box<dyn FnOnce(&mut Vec<ListRecord>) + Send>;

/// How `set_records` changes a slot.
pub enum RecordsUpdate {
    /// Store this list as-is.
    Replace(Vec<ListRecord>),
    /// Compute the new list from the slot's value at apply time.
    Apply(RecordsFn),
    /// Edit the list if it has been fetched; a never-fetched slot stays unfetched.
    ModifyLoaded(ModifyFn),
}

impl RecordsUpdate {
    pub fn apply(f: impl FnOnce(Option<Vec<ListRecord>>) -> Vec<ListRecord> + Send + 'static) -> Self {
        Self::Apply(Box::new(f))
    }

    pub fn modify_loaded(f: impl FnOnce(&mut Vec<ListRecord>) + Send + 'static) -> Self {
        Self::ModifyLoaded(Box::new(f))
    }
}

impl std::fmt::Debug for RecordsUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Replace(records) => f.debug_tuple("Replace").field(&records.len()).finish(),
            Self::Apply(_) => f.write_str("Apply(..)"),
            Self::ModifyLoaded(_) => f.write_str("ModifyLoaded(..)"),
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    /// `None` until the list has been fetched this session.
    records: Option<Vec<ListRecord>>,
    anime_names: HashMap<MalId, String>,
    episode_counts: HashMap<MalId, u32>,
}

impl Slot {
    fn entries(&self) -> Option<Vec<ListEntryView>> {
        let records = self.records.as_ref()?;
        Some(
            records
                .iter()
                .map(|record| ListEntryView {
                    record: record.clone(),
                    title: self.anime_names.get(&record.mal_id).cloned(),
                    total_episodes: self.episode_counts.get(&record.mal_id).copied(),
                })
                .collect(),
        )
    }

    /// Ids in the records with no resolved name. Every successful lookup
    /// yields a name, while the episode count may legitimately be unknown.
    fn missing_lookups(&self) -> Vec<MalId> {
        let mut missing = Vec::new();
        for record in self.records.iter().flatten() {
            if !self.anime_names.contains_key(&record.mal_id) && !missing.contains(&record.mal_id) {
                missing.push(record.mal_id);
            }
        }
        missing
    }
}

#[derive(Clone)]
pub struct ListCacheHandle {
    tx: mpsc::UnboundedSender<CacheCommand>,
}

enum CacheCommand {
    GetRecords {
        user_id: UserId,
        reply: oneshot::Sender<Option<Vec<ListRecord>>>,
    },
    SetRecords {
        user_id: UserId,
        update: RecordsUpdate,
        reply: oneshot::Sender<Option<Vec<ListRecord>>>,
    },
    GetName {
        user_id: UserId,
        mal_id: MalId,
        reply: oneshot::Sender<Option<String>>,
    },
    GetEpisodeCount {
        user_id: UserId,
        mal_id: MalId,
        reply: oneshot::Sender<Option<u32>>,
    },
    MergeNames {
        user_id: UserId,
        names: HashMap<MalId, String>,
        reply: oneshot::Sender<()>,
    },
    MergeEpisodeCounts {
        user_id: UserId,
        counts: HashMap<MalId, u32>,
        reply: oneshot::Sender<()>,
    },
    NamesSnapshot {
        user_id: UserId,
        reply: oneshot::Sender<HashMap<MalId, String>>,
    },
    Entries {
        user_id: UserId,
        reply: oneshot::Sender<Option<Vec<ListEntryView>>>,
    },
    MissingLookups {
        user_id: UserId,
        reply: oneshot::Sender<Vec<MalId>>,
    },
    ActiveUser {
        reply: oneshot::Sender<Option<UserId>>,
    },
    Evict {
        user_id: UserId,
        reply: oneshot::Sender<bool>,
    },
}

impl ListCacheHandle {
    /// Spawn the cache actor on the current tokio runtime.
    ///
    /// The actor follows `session` to decide which slot is active. With
    /// `evict_on_logout`, a user's slot is dropped once they stop being the
    /// active identity.
    pub fn spawn(session: watch::Receiver<Session>, evict_on_logout: bool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = CacheActor::new(session, evict_on_logout);
        tokio::spawn(actor.run(rx));
        Self { tx }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> CacheCommand,
    ) -> Result<T, MitsukeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| MitsukeError::CacheClosed)?;
        rx.await.map_err(|_| MitsukeError::CacheClosed)
    }

    /// Records for `user_id`; `None` if never fetched this session.
    pub async fn get_records(&self, user_id: UserId) -> Result<Option<Vec<ListRecord>>, MitsukeError> {
        self.request(|reply| CacheCommand::GetRecords { user_id, reply })
            .await
    }

    /// Apply `update` to the slot and return the slot's records afterwards.
    pub async fn set_records(
        &self,
        user_id: UserId,
        update: RecordsUpdate,
    ) -> Result<Option<Vec<ListRecord>>, MitsukeError> {
        self.request(|reply| CacheCommand::SetRecords {
            user_id,
            update,
            reply,
        })
        .await
    }

    /// Cached display title; `None` means a lookup is needed.
    pub async fn get_name(&self, user_id: UserId, mal_id: MalId) -> Result<Option<String>, MitsukeError> {
        self.request(|reply| CacheCommand::GetName {
            user_id,
            mal_id,
            reply,
        })
        .await
    }

    /// Cached total episode count, if the catalog reported one.
    pub async fn get_episode_count(
        &self,
        user_id: UserId,
        mal_id: MalId,
    ) -> Result<Option<u32>, MitsukeError> {
        self.request(|reply| CacheCommand::GetEpisodeCount {
            user_id,
            mal_id,
            reply,
        })
        .await
    }

    /// Union `names` into the slot. Entries already present are kept.
    pub async fn merge_names(
        &self,
        user_id: UserId,
        names: HashMap<MalId, String>,
    ) -> Result<(), MitsukeError> {
        self.request(|reply| CacheCommand::MergeNames {
            user_id,
            names,
            reply,
        })
        .await
    }

    /// Union `counts` into the slot. Entries already present are kept.
    pub async fn merge_episode_counts(
        &self,
        user_id: UserId,
        counts: HashMap<MalId, u32>,
    ) -> Result<(), MitsukeError> {
        self.request(|reply| CacheCommand::MergeEpisodeCounts {
            user_id,
            counts,
            reply,
        })
        .await
    }

    pub async fn names_snapshot(&self, user_id: UserId) -> Result<HashMap<MalId, String>, MitsukeError> {
        self.request(|reply| CacheCommand::NamesSnapshot { user_id, reply })
            .await
    }

    /// Records joined with their cached title and episode count.
    pub async fn entries(&self, user_id: UserId) -> Result<Option<Vec<ListEntryView>>, MitsukeError> {
        self.request(|reply| CacheCommand::Entries { user_id, reply })
            .await
    }

    /// Catalog ids in the slot's records that still need a catalog lookup.
    pub async fn missing_lookups(&self, user_id: UserId) -> Result<Vec<MalId>, MitsukeError> {
        self.request(|reply| CacheCommand::MissingLookups { user_id, reply })
            .await
    }

    /// The identity whose slot the UI currently reads.
    pub async fn active_user(&self) -> Result<Option<UserId>, MitsukeError> {
        self.request(|reply| CacheCommand::ActiveUser { reply }).await
    }

    /// Records of the active identity, `None` when logged out or unfetched.
    pub async fn active_records(&self) -> Result<Option<Vec<ListRecord>>, MitsukeError> {
        match self.active_user().await? {
            Some(user_id) => self.get_records(user_id).await,
            None => Ok(None),
        }
    }

    /// Drop a slot entirely. Returns whether it existed.
    pub async fn evict(&self, user_id: UserId) -> Result<bool, MitsukeError> {
        self.request(|reply| CacheCommand::Evict { user_id, reply })
            .await
    }
}

// ── Actor ───────────────────────────────────────────────────────

struct CacheActor {
    slots: HashMap<UserId, Slot>,
    session: watch::Receiver<Session>,
    active: Option<UserId>,
    evict_on_logout: bool,
}

impl CacheActor {
    fn new(mut session: watch::Receiver<Session>, evict_on_logout: bool) -> Self {
        let active = session.borrow_and_update().user_id();
        Self {
            slots: HashMap::new(),
            session,
            active,
            evict_on_logout,
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<CacheCommand>) {
        while let Some(cmd) = rx.recv().await {
            self.rescope();
            self.handle(cmd);
        }
        debug!("List cache actor stopped");
    }

    /// Follow the latest session before serving a command.
    fn rescope(&mut self) {
        if !self.session.has_changed().unwrap_or(false) {
            return;
        }
        let next = self.session.borrow_and_update().user_id();
        if next == self.active {
            return;
        }
        info!(from = ?self.active, to = ?next, "List cache rescoped");
        if self.evict_on_logout {
            if let Some(previous) = self.active {
                if self.slots.remove(&previous).is_some() {
                    debug!(user_id = %previous, "Evicted list cache slot");
                }
            }
        }
        self.active = next;
    }

    fn slot(&mut self, user_id: UserId) -> &mut Slot {
        self.slots.entry(user_id).or_default()
    }

    fn handle(&mut self, cmd: CacheCommand) {
        match cmd {
            CacheCommand::GetRecords { user_id, reply } => {
                let records = self.slots.get(&user_id).and_then(|s| s.records.clone());
                let _ = reply.send(records);
            }
            CacheCommand::SetRecords {
                user_id,
                update,
                reply,
            } => {
                debug!(%user_id, ?update, "Updating list records");
                let slot = self.slot(user_id);
                match update {
                    RecordsUpdate::Replace(records) => slot.records = Some(records),
                    RecordsUpdate::Apply(f) => {
                        let current = slot.records.take();
                        slot.records = Some(f(current));
                    }
                    RecordsUpdate::ModifyLoaded(f) => {
                        if let Some(records) = slot.records.as_mut() {
                            f(records);
                        }
                    }
                }
                let _ = reply.send(slot.records.clone());
            }
            CacheCommand::GetName {
                user_id,
                mal_id,
                reply,
            } => {
                let name = self
                    .slots
                    .get(&user_id)
                    .and_then(|s| s.anime_names.get(&mal_id).cloned());
                let _ = reply.send(name);
            }
            CacheCommand::GetEpisodeCount {
                user_id,
                mal_id,
                reply,
            } => {
                let count = self
                    .slots
                    .get(&user_id)
                    .and_then(|s| s.episode_counts.get(&mal_id).copied());
                let _ = reply.send(count);
            }
            CacheCommand::MergeNames {
                user_id,
                names,
                reply,
            } => {
                let slot = self.slot(user_id);
                for (mal_id, name) in names {
                    slot.anime_names.entry(mal_id).or_insert(name);
                }
                let _ = reply.send(());
            }
            CacheCommand::MergeEpisodeCounts {
                user_id,
                counts,
                reply,
            } => {
                let slot = self.slot(user_id);
                for (mal_id, count) in counts {
                    slot.episode_counts.entry(mal_id).or_insert(count);
                }
                let _ = reply.send(());
            }
            CacheCommand::NamesSnapshot { user_id, reply } => {
                let names = self
                    .slots
                    .get(&user_id)
                    .map(|s| s.anime_names.clone())
                    .unwrap_or_default();
                let _ = reply.send(names);
            }
            CacheCommand::Entries { user_id, reply } => {
                let _ = reply.send(self.slots.get(&user_id).and_then(Slot::entries));
            }
            CacheCommand::MissingLookups { user_id, reply } => {
                let missing = self
                    .slots
                    .get(&user_id)
                    .map(Slot::missing_lookups)
                    .unwrap_or_default();
                let _ = reply.send(missing);
            }
            CacheCommand::ActiveUser { reply } => {
                let _ = reply.send(self.active);
            }
            CacheCommand::Evict { user_id, reply } => {
                let _ = reply.send(self.slots.remove(&user_id).is_some());
            }
        }
    }
}
