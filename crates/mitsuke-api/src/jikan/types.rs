use serde::Deserialize;

use crate::traits::{CatalogAnime, CatalogPage};

// ── Envelopes ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct JikanSingleResponse {
    pub data: JikanAnime,
}

#[derive(Debug, Deserialize)]
pub struct JikanListResponse {
    #[serde(default)]
    pub data: Vec<JikanAnime>,
    pub pagination: Option<JikanPagination>,
}

#[derive(Debug, Deserialize)]
pub struct JikanPagination {
    #[serde(default)]
    pub has_next_page: bool,
}

// ── Anime ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct JikanAnime {
    pub mal_id: u64,
    pub title: String,
    pub title_english: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub score: Option<f32>,
    pub aired: Option<JikanAired>,
    pub episodes: Option<u32>,
    pub synopsis: Option<String>,
    pub images: Option<JikanImages>,
    pub season: Option<String>,
    pub rating: Option<String>,
    #[serde(default)]
    pub genres: Vec<JikanGenre>,
}

#[derive(Debug, Deserialize)]
pub struct JikanAired {
    pub string: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JikanImages {
    pub jpg: Option<JikanImage>,
}

#[derive(Debug, Deserialize)]
pub struct JikanImage {
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JikanGenre {
    pub name: String,
}

impl JikanAnime {
    pub fn into_catalog_anime(self) -> CatalogAnime {
        CatalogAnime {
            mal_id: self.mal_id,
            title: self.title,
            title_english: self.title_english,
            media_type: self.kind,
            score: self.score,
            aired: self.aired.and_then(|a| a.string),
            episodes: self.episodes,
            synopsis: self.synopsis,
            image_url: self.images.and_then(|i| i.jpg).and_then(|j| j.image_url),
            season: self.season,
            rating: self.rating,
            genres: self.genres.into_iter().map(|g| g.name).collect(),
        }
    }
}

impl JikanListResponse {
    pub fn into_page(self) -> CatalogPage {
        CatalogPage {
            items: self
                .data
                .into_iter()
                .map(JikanAnime::into_catalog_anime)
                .collect(),
            has_next: self.pagination.is_some_and(|p| p.has_next_page),
        }
    }
}
