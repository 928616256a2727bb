//! Lazy title and episode-count lookups for list records.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use mitsuke_api::traits::{CatalogAnime, CatalogService};
use mitsuke_core::fetch::{
    fetch_with_retry, Classify, FailureClass, FetchOrchestrator, FetchOutcome,
};
use mitsuke_core::list_cache::ListCacheHandle;
use mitsuke_core::models::{MalId, UserId};
use mitsuke_core::scope::Scoped;

use crate::RuntimeError;

/// Why a shared lookup produced nothing. Retries already happened inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
enum LookupFailure {
    #[error("not in catalog")]
    NotFound,
    #[error("catalog unavailable")]
    Unavailable,
}

impl Classify for LookupFailure {
    fn classify(&self) -> FailureClass {
        match self {
            Self::NotFound => FailureClass::NotFound,
            Self::Unavailable => FailureClass::Fatal,
        }
    }
}

type Lookup = Shared<BoxFuture<'static, Result<CatalogAnime, LookupFailure>>>;

/// Resolves names and episode counts of list records, one catalog request
/// per missing id no matter how many views ask at once.
pub struct Enricher<C> {
    catalog: Arc<C>,
    fetcher: FetchOrchestrator,
    /// Running and successful lookups. A successful entry stays for the
    /// session, so a view that asks before the result reaches its cache slot
    /// reuses it. Failed entries are removed and looked up again later.
    lookups: Arc<Mutex<HashMap<MalId, Lookup>>>,
}

impl<C: CatalogService + 'static> Enricher<C> {
    pub fn new(catalog: Arc<C>, fetcher: FetchOrchestrator) -> Self {
        Self {
            catalog,
            fetcher,
            lookups: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Join the lookup for `mal_id`, or start one.
    ///
    /// The request runs as its own task under its own token, so a view
    /// going away never cancels a request another view is waiting on.
    fn lookup(&self, mal_id: MalId) -> Lookup {
        let mut lookups = self.lookups.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = lookups.get(&mal_id) {
            debug!(mal_id, "Reusing catalog lookup");
            return existing.clone();
        }

        let catalog = Arc::clone(&self.catalog);
        let retry = self.fetcher.retry;
        let registry = Arc::clone(&self.lookups);
        let task = tokio::spawn(async move {
            let token = CancellationToken::new();
            let outcome = fetch_with_retry(mal_id, &retry, &token, |id| catalog.get_anime(id)).await;
            let result = match outcome {
                FetchOutcome::Ready(anime) => Ok(anime),
                FetchOutcome::NotFound => Err(LookupFailure::NotFound),
                FetchOutcome::Unavailable | FetchOutcome::RateLimited | FetchOutcome::Cancelled => {
                    Err(LookupFailure::Unavailable)
                }
            };
            if let Err(failure) = &result {
                debug!(mal_id, %failure, "Catalog lookup failed");
                registry
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&mal_id);
            }
            result
        });
        let lookup = async move { task.await.unwrap_or(Err(LookupFailure::Unavailable)) }
            .boxed()
            .shared();

        lookups.insert(mal_id, lookup.clone());
        lookup
    }

    /// Number of lookups still waiting on a result.
    pub fn in_flight(&self) -> usize {
        self.lookups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|lookup| lookup.peek().is_none())
            .count()
    }

    /// Fill in names and episode counts for `user_id`'s records that lack
    /// them. Returns how many ids were resolved.
    ///
    /// Nothing is merged once `cancel` fires.
    pub async fn enrich(
        &self,
        cache: &ListCacheHandle,
        user_id: UserId,
        cancel: &CancellationToken,
    ) -> Result<Scoped<usize>, RuntimeError> {
        let missing = cache.missing_lookups(user_id).await?;
        if missing.is_empty() {
            debug!(%user_id, "All list lookups cached");
            return Ok(Scoped::Done(0));
        }
        debug!(%user_id, count = missing.len(), "Resolving list lookups");

        let Ok(found) = self
            .fetcher
            .fetch_batch(&missing, cancel, |id| self.lookup(id))
            .await
        else {
            return Ok(Scoped::Cancelled);
        };

        let names: HashMap<MalId, String> = found
            .iter()
            .map(|anime| (anime.mal_id, anime.display_title().to_string()))
            .collect();
        let counts: HashMap<MalId, u32> = found
            .iter()
            .filter_map(|anime| anime.episodes.map(|n| (anime.mal_id, n)))
            .collect();

        cache.merge_names(user_id, names).await?;
        cache.merge_episode_counts(user_id, counts).await?;
        Ok(Scoped::Done(found.len()))
    }
}
