//! In-memory stand-ins for the catalog and the companion backend.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mitsuke_api::backend::AuthError;
use mitsuke_api::traits::{
    AnimeRecordService, AuthService, CatalogAnime, CatalogPage, CatalogService, ListRecord,
    ListRecordPatch, ListService, LocalAnimeRecord, LoginResponse, MalId, NewListRecord,
    NewLocalAnime, Profile, ProfilePatch, RecommendationService, RecordId, RegistrationFields,
    UserId, UserRecord,
};
use mitsuke_api::ApiError;
use mitsuke_core::config::AppConfig;
use mitsuke_core::session::SessionStore;
use mitsuke_core::storage::MemorySessionStorage;
use mitsuke_runtime::Runtime;

pub fn api_error(status: u16) -> ApiError {
    ApiError::Api {
        status,
        message: format!("status {status}"),
    }
}

pub fn anime(mal_id: MalId, title: &str, episodes: Option<u32>) -> CatalogAnime {
    CatalogAnime {
        mal_id,
        title: title.to_string(),
        title_english: None,
        media_type: Some("TV".into()),
        score: Some(8.5),
        aired: Some("Apr 3, 1998 to Apr 24, 1999".into()),
        episodes,
        synopsis: None,
        image_url: None,
        season: Some("spring".into()),
        rating: None,
        genres: Vec::new(),
    }
}

pub fn user(id: i64) -> UserRecord {
    UserRecord {
        user_id: UserId(id),
        username: format!("user{id}"),
        email: format!("user{id}@example.com"),
    }
}

// ── Catalog ─────────────────────────────────────────────────────

#[derive(Default)]
struct CatalogState {
    anime: HashMap<MalId, CatalogAnime>,
    /// Status returned instead of a result, per id.
    failures: HashMap<MalId, u16>,
    search_failure: Option<u16>,
    lookups: HashMap<MalId, usize>,
    searches: usize,
}

#[derive(Clone, Default)]
pub struct FakeCatalog {
    state: Arc<Mutex<CatalogState>>,
    delay: Duration,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request takes `delay` of (tokio) time.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn insert(&self, anime: CatalogAnime) {
        self.state.lock().unwrap().anime.insert(anime.mal_id, anime);
    }

    pub fn fail(&self, mal_id: MalId, status: u16) {
        self.state.lock().unwrap().failures.insert(mal_id, status);
    }

    pub fn fail_search(&self, status: u16) {
        self.state.lock().unwrap().search_failure = Some(status);
    }

    pub fn lookups(&self, mal_id: MalId) -> usize {
        self.state
            .lock()
            .unwrap()
            .lookups
            .get(&mal_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_lookups(&self) -> usize {
        self.state.lock().unwrap().lookups.values().sum()
    }

    pub fn searches(&self) -> usize {
        self.state.lock().unwrap().searches
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn page(&self) -> CatalogPage {
        let state = self.state.lock().unwrap();
        let mut items: Vec<CatalogAnime> = state.anime.values().cloned().collect();
        items.sort_by_key(|a| a.mal_id);
        CatalogPage {
            items,
            has_next: false,
        }
    }
}

impl CatalogService for FakeCatalog {
    async fn get_anime(&self, mal_id: MalId) -> Result<CatalogAnime, ApiError> {
        *self.state.lock().unwrap().lookups.entry(mal_id).or_default() += 1;
        self.pause().await;
        let state = self.state.lock().unwrap();
        if let Some(status) = state.failures.get(&mal_id) {
            return Err(api_error(*status));
        }
        state.anime.get(&mal_id).cloned().ok_or_else(|| api_error(404))
    }

    async fn list_anime(&self, _page: u32) -> Result<CatalogPage, ApiError> {
        self.pause().await;
        Ok(self.page())
    }

    async fn search_anime(&self, query: &str, _page: u32) -> Result<CatalogPage, ApiError> {
        self.state.lock().unwrap().searches += 1;
        self.pause().await;
        if let Some(status) = self.state.lock().unwrap().search_failure {
            return Err(api_error(status));
        }
        let needle = query.to_lowercase();
        let mut page = self.page();
        page.items.retain(|a| a.title.to_lowercase().contains(&needle));
        Ok(page)
    }

    async fn anime_by_genres(&self, _genre_ids: &[u32]) -> Result<CatalogPage, ApiError> {
        self.pause().await;
        Ok(self.page())
    }

    async fn airing_now(&self) -> Result<CatalogPage, ApiError> {
        self.pause().await;
        Ok(self.page())
    }

    async fn upcoming(&self) -> Result<CatalogPage, ApiError> {
        self.pause().await;
        Ok(self.page())
    }

    async fn top_anime(&self) -> Result<CatalogPage, ApiError> {
        self.pause().await;
        Ok(self.page())
    }
}

// ── Backend ─────────────────────────────────────────────────────

#[derive(Default)]
struct BackendState {
    records: HashMap<UserId, Vec<ListRecord>>,
    next_record: i64,
    local_anime: HashMap<MalId, LocalAnimeRecord>,
    created_local: Vec<NewLocalAnime>,
    recommendations: Vec<MalId>,
    unverified: bool,
    fail_mutations: bool,
    list_calls: Vec<UserId>,
    create_calls: usize,
    update_calls: usize,
    delete_calls: usize,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<BackendState>>,
    list_delay: Duration,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// `list_records` takes `delay` of (tokio) time.
    pub fn with_list_delay(delay: Duration) -> Self {
        Self {
            list_delay: delay,
            ..Self::default()
        }
    }

    pub fn seed_records(&self, user_id: UserId, records: Vec<ListRecord>) {
        self.state.lock().unwrap().records.insert(user_id, records);
    }

    pub fn set_recommendations(&self, ids: Vec<MalId>) {
        self.state.lock().unwrap().recommendations = ids;
    }

    pub fn set_unverified(&self) {
        self.state.lock().unwrap().unverified = true;
    }

    pub fn fail_mutations(&self) {
        self.state.lock().unwrap().fail_mutations = true;
    }

    pub fn list_calls(&self) -> Vec<UserId> {
        self.state.lock().unwrap().list_calls.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn update_calls(&self) -> usize {
        self.state.lock().unwrap().update_calls
    }

    pub fn delete_calls(&self) -> usize {
        self.state.lock().unwrap().delete_calls
    }

    pub fn created_local(&self) -> Vec<NewLocalAnime> {
        self.state.lock().unwrap().created_local.clone()
    }
}

impl AuthService for FakeBackend {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        if self.state.lock().unwrap().unverified {
            return Err(AuthError::Unverified("Please verify your email.".into()));
        }
        if username == "rin" && password == "secret" {
            Ok(LoginResponse {
                token: "jwt-7".into(),
                user: UserRecord {
                    user_id: UserId(7),
                    username: "rin".into(),
                    email: "rin@example.com".into(),
                },
            })
        } else {
            Err(AuthError::InvalidCredentials("Bad credentials".into()))
        }
    }

    async fn register(&self, fields: &RegistrationFields) -> Result<UserRecord, AuthError> {
        Ok(UserRecord {
            user_id: UserId(99),
            username: fields.username.clone(),
            email: fields.email.clone(),
        })
    }

    async fn resend_verification(&self, _user_id: UserId) -> Result<(), AuthError> {
        Err(AuthError::RateLimited)
    }

    async fn request_password_reset(&self, _email: &str) -> Result<String, AuthError> {
        Ok("Reset link sent.".into())
    }

    async fn reset_password(&self, token: &str, _new_password: &str) -> Result<String, AuthError> {
        match token {
            "expired" => Err(AuthError::ExpiredToken),
            "used" => Err(AuthError::UsedToken),
            "good" => Ok("Password reset.".into()),
            _ => Err(AuthError::InvalidToken),
        }
    }

    async fn verify_account(&self, token: &str) -> Result<String, AuthError> {
        if token == "good" {
            Ok("Account verified.".into())
        } else {
            Err(AuthError::InvalidToken)
        }
    }

    async fn current_profile(&self) -> Result<Profile, AuthError> {
        Ok(Profile {
            username: "rin".into(),
            email: "rin@example.com".into(),
            first_name: "Rin".into(),
            last_name: "Shima".into(),
        })
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        patch: &ProfilePatch,
    ) -> Result<UserRecord, AuthError> {
        Ok(UserRecord {
            user_id,
            username: patch.username.clone(),
            email: patch.email.clone(),
        })
    }
}

impl AnimeRecordService for FakeBackend {
    async fn get_local_anime(&self, mal_id: MalId) -> Result<Option<LocalAnimeRecord>, ApiError> {
        Ok(self.state.lock().unwrap().local_anime.get(&mal_id).cloned())
    }

    async fn create_local_anime(&self, anime: &NewLocalAnime) -> Result<LocalAnimeRecord, ApiError> {
        let record = LocalAnimeRecord {
            mal_id: anime.mal_id,
            name: anime.name.clone(),
            anime_type: anime.anime_type,
            episodes: anime.episodes,
            score: anime.score,
            aired: anime.aired.clone(),
            premiered: anime.premiered.clone(),
            genres: anime.genres.clone(),
            english_name: None,
            japanese_name: None,
        };
        let mut state = self.state.lock().unwrap();
        state.created_local.push(anime.clone());
        state.local_anime.insert(anime.mal_id, record.clone());
        Ok(record)
    }
}

impl ListService for FakeBackend {
    async fn list_records(&self, user_id: UserId) -> Result<Vec<ListRecord>, ApiError> {
        self.state.lock().unwrap().list_calls.push(user_id);
        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .records
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_record(&self, new: &NewListRecord) -> Result<ListRecord, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        if state.fail_mutations {
            return Err(api_error(500));
        }
        state.next_record += 1;
        let record = ListRecord {
            id: RecordId(1000 + state.next_record),
            mal_id: new.mal_id,
            status: None,
            rating: None,
            episodes_watched: None,
        };
        state
            .records
            .entry(new.user_id)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update_record(
        &self,
        record_id: RecordId,
        patch: &ListRecordPatch,
    ) -> Result<ListRecord, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.update_calls += 1;
        if state.fail_mutations {
            return Err(api_error(500));
        }
        let record = state
            .records
            .values_mut()
            .flatten()
            .find(|r| r.id == record_id)
            .ok_or_else(|| api_error(404))?;
        patch.apply_to(record);
        Ok(record.clone())
    }

    async fn delete_record(&self, record_id: RecordId) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls += 1;
        if state.fail_mutations {
            return Err(api_error(500));
        }
        for records in state.records.values_mut() {
            records.retain(|r| r.id != record_id);
        }
        Ok(())
    }
}

impl RecommendationService for FakeBackend {
    async fn recommendations(&self, _user_id: UserId, _safe_search: bool) -> Result<Vec<MalId>, ApiError> {
        Ok(self.state.lock().unwrap().recommendations.clone())
    }
}

// ── Wiring ──────────────────────────────────────────────────────

pub struct Harness {
    pub runtime: Runtime<FakeCatalog, FakeBackend>,
    pub catalog: FakeCatalog,
    pub backend: FakeBackend,
}

pub fn harness(catalog: FakeCatalog, backend: FakeBackend) -> Harness {
    harness_with_config(catalog, backend, AppConfig::default())
}

pub fn harness_with_config(catalog: FakeCatalog, backend: FakeBackend, config: AppConfig) -> Harness {
    let session = Arc::new(SessionStore::hydrate(MemorySessionStorage::new()));
    let runtime = Runtime::with_parts(config, session, catalog.clone(), backend.clone());
    Harness {
        runtime,
        catalog,
        backend,
    }
}

pub fn list_record(id: i64, mal_id: MalId) -> ListRecord {
    ListRecord {
        id: RecordId(id),
        mal_id,
        status: None,
        rating: None,
        episodes_watched: None,
    }
}
