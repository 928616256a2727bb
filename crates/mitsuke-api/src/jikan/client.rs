use reqwest::Client;

use super::types::{JikanListResponse, JikanSingleResponse};
use crate::error::{check_response, ApiError};
use crate::traits::{CatalogAnime, CatalogPage, CatalogService, MalId};

pub const DEFAULT_BASE_URL: &str = "https://api.jikan.moe/v4";

/// Jikan v4 REST client (unauthenticated, read-only).
pub struct JikanClient {
    base_url: String,
    http: Client,
}

impl JikanClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    async fn get_page(&self, path: &str, query: &[(&str, String)]) -> Result<CatalogPage, ApiError> {
        let resp = self
            .http
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .send()
            .await?;

        let resp = check_response(resp).await?;
        let list: JikanListResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        Ok(list.into_page())
    }
}

impl Default for JikanClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl CatalogService for JikanClient {
    async fn get_anime(&self, mal_id: MalId) -> Result<CatalogAnime, ApiError> {
        tracing::debug!(mal_id, "Fetching catalog entry");
        let resp = self
            .http
            .get(format!("{}/anime/{mal_id}", self.base_url))
            .send()
            .await?;

        let resp = check_response(resp).await?;
        let single: JikanSingleResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        Ok(single.data.into_catalog_anime())
    }

    async fn list_anime(&self, page: u32) -> Result<CatalogPage, ApiError> {
        self.get_page("/anime", &[("page", page.max(1).to_string())])
            .await
    }

    async fn search_anime(&self, query: &str, page: u32) -> Result<CatalogPage, ApiError> {
        self.get_page(
            "/anime",
            &[("q", query.to_string()), ("page", page.max(1).to_string())],
        )
        .await
    }

    async fn anime_by_genres(&self, genre_ids: &[u32]) -> Result<CatalogPage, ApiError> {
        let genres = genre_ids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.get_page("/anime", &[("genres", genres)]).await
    }

    async fn airing_now(&self) -> Result<CatalogPage, ApiError> {
        self.get_page("/seasons/now", &[]).await
    }

    async fn upcoming(&self) -> Result<CatalogPage, ApiError> {
        self.get_page("/seasons/upcoming", &[]).await
    }

    async fn top_anime(&self) -> Result<CatalogPage, ApiError> {
        self.get_page("/top/anime", &[]).await
    }
}
