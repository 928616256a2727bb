use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use mitsuke_api::traits::{
    Backend, CatalogAnime, CatalogPage, CatalogService, LocalAnimeRecord, NewLocalAnime,
};
use mitsuke_core::fetch::FetchOutcome;
use mitsuke_core::models::MalId;
use mitsuke_core::scope::{scoped, Scoped};

use crate::{Runtime, RuntimeError};

/// A catalog item together with its local mirror.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimeDetails {
    pub catalog: CatalogAnime,
    pub local: LocalAnimeRecord,
}

impl<C, B> Runtime<C, B>
where
    C: CatalogService + 'static,
    B: Backend + 'static,
{
    // ── Catalog queries ─────────────────────────────────────────

    pub async fn top_anime(&self, cancel: &CancellationToken) -> FetchOutcome<CatalogPage> {
        self.fetcher
            .fetch_with_retry("top", cancel, |_| self.catalog.top_anime())
            .await
    }

    pub async fn airing_now(&self, cancel: &CancellationToken) -> FetchOutcome<CatalogPage> {
        self.fetcher
            .fetch_with_retry("seasons/now", cancel, |_| self.catalog.airing_now())
            .await
    }

    pub async fn upcoming(&self, cancel: &CancellationToken) -> FetchOutcome<CatalogPage> {
        self.fetcher
            .fetch_with_retry("seasons/upcoming", cancel, |_| self.catalog.upcoming())
            .await
    }

    pub async fn browse(&self, page: u32, cancel: &CancellationToken) -> FetchOutcome<CatalogPage> {
        self.fetcher
            .fetch_with_retry(page, cancel, |page| self.catalog.list_anime(page))
            .await
    }

    /// Free-text search. A blank query is rejected without a request.
    pub async fn search(
        &self,
        query: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome<CatalogPage>, RuntimeError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RuntimeError::Validation("Please enter a search term.".into()));
        }
        let catalog = &self.catalog;
        let outcome = self
            .fetcher
            .fetch_with_retry((query.to_string(), page), cancel, |(q, page)| async move {
                catalog.search_anime(&q, page).await
            })
            .await;
        Ok(empty_is_not_found(outcome))
    }

    pub async fn by_genres(
        &self,
        genre_ids: &[u32],
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome<CatalogPage>, RuntimeError> {
        if genre_ids.is_empty() {
            return Err(RuntimeError::Validation("Pick at least one genre.".into()));
        }
        let outcome = self
            .fetcher
            .fetch_with_retry(genre_ids.to_vec(), cancel, |ids| async move {
                self.catalog.anime_by_genres(&ids).await
            })
            .await;
        Ok(empty_is_not_found(outcome))
    }

    // ── Details ─────────────────────────────────────────────────

    /// Make sure the backend has a local record for `anime`, creating it
    /// from the catalog item the first time.
    pub async fn ensure_local_record(
        &self,
        anime: &CatalogAnime,
    ) -> Result<LocalAnimeRecord, RuntimeError> {
        if let Some(local) = self.backend.get_local_anime(anime.mal_id).await? {
            debug!(mal_id = anime.mal_id, "Local record exists");
            return Ok(local);
        }
        let created = self
            .backend
            .create_local_anime(&NewLocalAnime::from_catalog(anime))
            .await?;
        info!(mal_id = anime.mal_id, "Mirrored catalog item locally");
        Ok(created)
    }

    /// Catalog item plus local mirror, as shown on the details page.
    pub async fn details(
        &self,
        mal_id: MalId,
        cancel: &CancellationToken,
    ) -> Result<Scoped<AnimeDetails>, RuntimeError> {
        let catalog = match self
            .fetcher
            .fetch_with_retry(mal_id, cancel, |id| self.catalog.get_anime(id))
            .await
        {
            FetchOutcome::Ready(anime) => anime,
            FetchOutcome::NotFound => return Err(RuntimeError::NotFound),
            FetchOutcome::Unavailable | FetchOutcome::RateLimited => {
                return Err(RuntimeError::Unavailable)
            }
            FetchOutcome::Cancelled => return Ok(Scoped::Cancelled),
        };

        match scoped(cancel, self.ensure_local_record(&catalog)).await {
            Scoped::Done(local) => Ok(Scoped::Done(AnimeDetails {
                catalog,
                local: local?,
            })),
            Scoped::Cancelled => Ok(Scoped::Cancelled),
        }
    }

    // ── Recommendations ─────────────────────────────────────────

    /// Recommended anime for the signed-in user, looked up in rate-limited
    /// batches. Items whose lookup fails are left out.
    pub async fn recommendations(
        &self,
        safe_search: bool,
        cancel: &CancellationToken,
    ) -> Result<Scoped<Vec<CatalogAnime>>, RuntimeError> {
        let user_id = self.require_user()?;
        let ids = match scoped(cancel, self.backend.recommendations(user_id, safe_search)).await {
            Scoped::Done(ids) => ids?,
            Scoped::Cancelled => return Ok(Scoped::Cancelled),
        };
        debug!(%user_id, count = ids.len(), safe_search, "Fetching recommendation details");

        match self
            .fetcher
            .fetch_batch(&ids, cancel, |id| self.catalog.get_anime(id))
            .await
        {
            Ok(anime) => Ok(Scoped::Done(anime)),
            Err(_) => Ok(Scoped::Cancelled),
        }
    }
}

/// An empty result page reads as "no results".
fn empty_is_not_found(outcome: FetchOutcome<CatalogPage>) -> FetchOutcome<CatalogPage> {
    match outcome {
        FetchOutcome::Ready(page) if page.items.is_empty() => FetchOutcome::NotFound,
        other => other,
    }
}
