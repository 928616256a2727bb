//! Trait definitions for the services the client talks to.
//!
//! The catalog (Jikan) and the companion backend each implement these
//! traits, so the runtime and its tests can swap real clients for fakes.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::backend::AuthError;
use crate::error::ApiError;

/// Catalog identifier (MyAnimeList id).
pub type MalId = u64;

/// Read-only, independently rate-limited anime catalog.
pub trait CatalogService: Send + Sync {
    /// Fetch a single anime by catalog id.
    fn get_anime(&self, mal_id: MalId)
        -> impl Future<Output = Result<CatalogAnime, ApiError>> + Send;

    /// One page of the full catalog listing.
    fn list_anime(&self, page: u32) -> impl Future<Output = Result<CatalogPage, ApiError>> + Send;

    /// Free-text search.
    fn search_anime(
        &self,
        query: &str,
        page: u32,
    ) -> impl Future<Output = Result<CatalogPage, ApiError>> + Send;

    /// Anime matching every one of the given genre ids.
    fn anime_by_genres(
        &self,
        genre_ids: &[u32],
    ) -> impl Future<Output = Result<CatalogPage, ApiError>> + Send;

    /// Anime airing this season.
    fn airing_now(&self) -> impl Future<Output = Result<CatalogPage, ApiError>> + Send;

    /// Anime announced for upcoming seasons.
    fn upcoming(&self) -> impl Future<Output = Result<CatalogPage, ApiError>> + Send;

    /// Top-rated anime.
    fn top_anime(&self) -> impl Future<Output = Result<CatalogPage, ApiError>> + Send;
}

/// Account and session operations of the companion backend.
pub trait AuthService: Send + Sync {
    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<LoginResponse, AuthError>> + Send;

    fn register(
        &self,
        fields: &RegistrationFields,
    ) -> impl Future<Output = Result<UserRecord, AuthError>> + Send;

    fn resend_verification(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Returns the backend's confirmation message.
    fn request_password_reset(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<String, AuthError>> + Send;

    fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> impl Future<Output = Result<String, AuthError>> + Send;

    fn verify_account(&self, token: &str) -> impl Future<Output = Result<String, AuthError>> + Send;

    /// Profile of the user owning the attached credential.
    fn current_profile(&self) -> impl Future<Output = Result<Profile, AuthError>> + Send;

    fn update_profile(
        &self,
        user_id: UserId,
        patch: &ProfilePatch,
    ) -> impl Future<Output = Result<UserRecord, AuthError>> + Send;
}

/// Local mirror of catalog items, so list rows can reference a stable id.
pub trait AnimeRecordService: Send + Sync {
    /// `Ok(None)` when no local record exists yet.
    fn get_local_anime(
        &self,
        mal_id: MalId,
    ) -> impl Future<Output = Result<Option<LocalAnimeRecord>, ApiError>> + Send;

    fn create_local_anime(
        &self,
        anime: &NewLocalAnime,
    ) -> impl Future<Output = Result<LocalAnimeRecord, ApiError>> + Send;
}

/// Persistence of the user's watch list.
pub trait ListService: Send + Sync {
    fn list_records(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<ListRecord>, ApiError>> + Send;

    fn create_record(
        &self,
        record: &NewListRecord,
    ) -> impl Future<Output = Result<ListRecord, ApiError>> + Send;

    fn update_record(
        &self,
        record_id: RecordId,
        patch: &ListRecordPatch,
    ) -> impl Future<Output = Result<ListRecord, ApiError>> + Send;

    fn delete_record(&self, record_id: RecordId) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Recommendation microservice.
pub trait RecommendationService: Send + Sync {
    fn recommendations(
        &self,
        user_id: UserId,
        safe_search: bool,
    ) -> impl Future<Output = Result<Vec<MalId>, ApiError>> + Send;
}

/// Everything the companion backend offers, as one bound.
pub trait Backend: AuthService + AnimeRecordService + ListService + RecommendationService {}

impl<T> Backend for T where T: AuthService + AnimeRecordService + ListService + RecommendationService
{}

/// Supplies the bearer credential attached to authenticated requests.
pub trait CredentialProvider: Send + Sync {
    fn credential(&self) -> Option<String>;
}

// ── Catalog types ────────────────────────────────────────────────

/// An anime as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogAnime {
    pub mal_id: MalId,
    pub title: String,
    pub title_english: Option<String>,
    pub media_type: Option<String>,
    pub score: Option<f32>,
    pub aired: Option<String>,
    pub episodes: Option<u32>,
    pub synopsis: Option<String>,
    pub image_url: Option<String>,
    pub season: Option<String>,
    pub rating: Option<String>,
    pub genres: Vec<String>,
}

impl CatalogAnime {
    /// English title when the catalog has one, the default title otherwise.
    pub fn display_title(&self) -> &str {
        self.title_english
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.title)
    }
}

/// A page of catalog results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogPage {
    pub items: Vec<CatalogAnime>,
    pub has_next: bool,
}

// ── Account types ────────────────────────────────────────────────

/// Backend user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The signed-in user as reported at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
}

/// Successful login exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserRecord,
}

/// Sign-up form.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationFields {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Full profile of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "firstName")]
    pub first_name: String,
    #[serde(default, alias = "lastName")]
    pub last_name: String,
}

/// Profile edit. The password is only sent when set.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

// ── Local anime records ──────────────────────────────────────────

/// Kind of anime as stored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnimeType {
    Tv,
    Movie,
    Ova,
    Ona,
    Special,
}

impl AnimeType {
    /// Map the catalog's free-form type. Unknown or missing types are TV.
    pub fn from_catalog(kind: Option<&str>) -> Self {
        match kind.map(str::to_uppercase).as_deref() {
            Some("MOVIE") => Self::Movie,
            Some("OVA") => Self::Ova,
            Some("ONA") => Self::Ona,
            Some("SPECIAL") => Self::Special,
            _ => Self::Tv,
        }
    }
}

/// An anime mirrored into the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalAnimeRecord {
    pub mal_id: MalId,
    pub name: String,
    #[serde(rename = "type")]
    pub anime_type: AnimeType,
    pub episodes: u32,
    pub score: f32,
    #[serde(default)]
    pub aired: String,
    #[serde(default)]
    pub premiered: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub english_name: Option<String>,
    #[serde(default)]
    pub japanese_name: Option<String>,
}

/// Minimal fields needed to mirror a catalog item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLocalAnime {
    pub mal_id: MalId,
    pub name: String,
    #[serde(rename = "type")]
    pub anime_type: AnimeType,
    pub episodes: u32,
    pub score: f32,
    pub aired: String,
    pub premiered: String,
    pub genres: Vec<String>,
}

impl NewLocalAnime {
    pub fn from_catalog(anime: &CatalogAnime) -> Self {
        Self {
            mal_id: anime.mal_id,
            name: anime.display_title().to_string(),
            anime_type: AnimeType::from_catalog(anime.media_type.as_deref()),
            episodes: anime.episodes.filter(|&n| n > 0).unwrap_or(1),
            score: anime.score.unwrap_or(0.0),
            aired: anime.aired.clone().unwrap_or_default(),
            premiered: anime.season.clone().unwrap_or_default(),
            genres: Vec::new(),
        }
    }
}

// ── Watch list ───────────────────────────────────────────────────

/// Server-assigned list record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User's watch status for a list record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchStatus {
    Watching,
    Completed,
    OnHold,
    Dropped,
    PlanToWatch,
}

impl WatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Watching => "Watching",
            Self::Completed => "Completed",
            Self::OnHold => "On Hold",
            Self::Dropped => "Dropped",
            Self::PlanToWatch => "Plan to Watch",
        }
    }

    /// Parse the wire form (`ON_HOLD`) or a loose form (`on-hold`, `on hold`).
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase().replace(&['-', ' '][..], "_");
        match normalized.as_str() {
            "WATCHING" => Some(Self::Watching),
            "COMPLETED" => Some(Self::Completed),
            "ON_HOLD" => Some(Self::OnHold),
            "DROPPED" => Some(Self::Dropped),
            "PLAN_TO_WATCH" => Some(Self::PlanToWatch),
            _ => None,
        }
    }

    pub const ALL: &[WatchStatus] = &[
        Self::Watching,
        Self::Completed,
        Self::OnHold,
        Self::Dropped,
        Self::PlanToWatch,
    ];
}

impl std::fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a user's watch list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecord {
    pub id: RecordId,
    #[serde(alias = "animeId")]
    pub mal_id: MalId,
    #[serde(default)]
    pub status: Option<WatchStatus>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub episodes_watched: Option<u32>,
}

/// Body of an add-to-list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListRecord {
    pub user_id: UserId,
    pub mal_id: MalId,
}

/// Partial edit of a list record. Only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WatchStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episodes_watched: Option<u32>,
}

impl ListRecordPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.rating.is_none() && self.episodes_watched.is_none()
    }

    /// Check value ranges before anything is sent.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(rating) = self.rating {
            if !(0.0..=10.0).contains(&rating) || rating.is_nan() {
                return Err("Rating must be between 0 and 10.".into());
            }
        }
        if self.is_empty() {
            return Err("Nothing to update.".into());
        }
        Ok(())
    }

    /// Apply this patch to a cached record, mirroring a confirmed update.
    pub fn apply_to(&self, record: &mut ListRecord) {
        if let Some(status) = self.status {
            record.status = Some(status);
        }
        if let Some(rating) = self.rating {
            record.rating = Some(rating);
        }
        if let Some(episodes) = self.episodes_watched {
            record.episodes_watched = Some(episodes);
        }
    }
}
