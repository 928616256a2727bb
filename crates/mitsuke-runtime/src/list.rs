use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mitsuke_api::traits::{Backend, CatalogService, NewListRecord};
use mitsuke_core::list_cache::RecordsUpdate;
use mitsuke_core::messages::MessageBoard;
use mitsuke_core::models::{ListEntryView, ListRecord, ListRecordPatch, MalId, RecordId};
use mitsuke_core::scope::{scoped, Scoped};

use crate::feedback;
use crate::{Runtime, RuntimeError};

/// How a list mutation ended. The user-facing text goes to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    NotLoggedIn,
    /// Rejected before anything was sent.
    Invalid,
    Failed,
}

impl<C, B> Runtime<C, B>
where
    C: CatalogService + 'static,
    B: Backend + 'static,
{
    /// Load the signed-in user's list, fetching it only if this session
    /// has not fetched it yet, then resolve missing titles.
    ///
    /// Overlapping loads wait for the one already fetching.
    pub async fn load_my_list(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Scoped<Vec<ListEntryView>>, RuntimeError> {
        let user_id = self.require_user()?;

        if self.cache.get_records(user_id).await?.is_some() {
            debug!(%user_id, "List served from cache");
        } else {
            let Scoped::Done(_loading) = scoped(cancel, self.list_load.lock()).await else {
                return Ok(Scoped::Cancelled);
            };
            if self.cache.get_records(user_id).await?.is_some() {
                debug!(%user_id, "List loaded by another view");
            } else {
                let fetched = match scoped(cancel, self.backend.list_records(user_id)).await {
                    Scoped::Done(result) => result?,
                    Scoped::Cancelled => return Ok(Scoped::Cancelled),
                };
                debug!(%user_id, count = fetched.len(), "List fetched");
                self.cache
                    .set_records(
                        user_id,
                        RecordsUpdate::apply(move |prev| merge_fetched(fetched, prev)),
                    )
                    .await?;
            }
        }

        if let Scoped::Cancelled = self.enricher.enrich(&self.cache, user_id, cancel).await? {
            return Ok(Scoped::Cancelled);
        }

        let entries = self.cache.entries(user_id).await?.unwrap_or_default();
        Ok(Scoped::Done(entries))
    }

    /// Add a catalog item to the signed-in user's list.
    pub async fn add_to_list(
        &self,
        mal_id: MalId,
        board: &MessageBoard<MalId>,
    ) -> Result<MutationOutcome, RuntimeError> {
        let Some(user_id) = self.session.current().user_id() else {
            board.post(mal_id, feedback::NOT_LOGGED_IN);
            return Ok(MutationOutcome::NotLoggedIn);
        };

        match self
            .backend
            .create_record(&NewListRecord { user_id, mal_id })
            .await
        {
            Ok(record) => {
                info!(%user_id, mal_id, record_id = %record.id, "Added to list");
                self.cache
                    .set_records(user_id, RecordsUpdate::modify_loaded(move |records| records.push(record)))
                    .await?;
                board.post(mal_id, feedback::ADDED);
                Ok(MutationOutcome::Applied)
            }
            Err(e) => {
                warn!(%user_id, mal_id, "Failed to add anime: {e}");
                board.post(mal_id, feedback::ADD_FAILED);
                Ok(MutationOutcome::Failed)
            }
        }
    }

    /// Edit status, rating or progress of one record.
    pub async fn edit_record(
        &self,
        record_id: RecordId,
        patch: ListRecordPatch,
        board: &MessageBoard<MalId>,
    ) -> Result<MutationOutcome, RuntimeError> {
        let user_id = self.require_user()?;
        let mal_id = self.record_mal_id(record_id).await?;

        if let Err(message) = patch.validate() {
            board.post(mal_id, message);
            return Ok(MutationOutcome::Invalid);
        }

        match self.backend.update_record(record_id, &patch).await {
            Ok(_) => {
                info!(%user_id, %record_id, "Updated list record");
                self.cache
                    .set_records(
                        user_id,
                        RecordsUpdate::modify_loaded(move |records| {
                            if let Some(record) = records.iter_mut().find(|r| r.id == record_id) {
                                patch.apply_to(record);
                            }
                        }),
                    )
                    .await?;
                board.post(mal_id, feedback::UPDATED);
                Ok(MutationOutcome::Applied)
            }
            Err(e) => {
                warn!(%user_id, %record_id, "Failed to update anime: {e}");
                board.post(mal_id, feedback::UPDATE_FAILED);
                Ok(MutationOutcome::Failed)
            }
        }
    }

    /// Delete one record from the signed-in user's list.
    pub async fn remove_record(
        &self,
        record_id: RecordId,
        board: &MessageBoard<MalId>,
    ) -> Result<MutationOutcome, RuntimeError> {
        let user_id = self.require_user()?;
        let mal_id = self.record_mal_id(record_id).await?;

        match self.backend.delete_record(record_id).await {
            Ok(()) => {
                info!(%user_id, %record_id, "Removed list record");
                self.cache
                    .set_records(
                        user_id,
                        RecordsUpdate::modify_loaded(move |records| records.retain(|r| r.id != record_id)),
                    )
                    .await?;
                board.post(mal_id, feedback::REMOVED);
                Ok(MutationOutcome::Applied)
            }
            Err(e) => {
                warn!(%user_id, %record_id, "Failed to remove anime: {e}");
                board.post(mal_id, feedback::REMOVE_FAILED);
                Ok(MutationOutcome::Failed)
            }
        }
    }

    /// Catalog id of a cached record of the signed-in user.
    async fn record_mal_id(&self, record_id: RecordId) -> Result<MalId, RuntimeError> {
        self.cache
            .active_records()
            .await?
            .and_then(|records| records.into_iter().find(|r| r.id == record_id))
            .map(|r| r.mal_id)
            .ok_or(RuntimeError::NotFound)
    }
}

/// Take the server's list, keeping records added while it was in flight.
fn merge_fetched(fetched: Vec<ListRecord>, prev: Option<Vec<ListRecord>>) -> Vec<ListRecord> {
    let mut merged = fetched;
    for record in prev.into_iter().flatten() {
        if !merged.iter().any(|r| r.id == record.id) {
            merged.push(record);
        }
    }
    merged
}
