use std::sync::Arc;

use reqwest::{Client, RequestBuilder};

use super::error::AuthError;
use super::types::{LoginRequest, MessageBody, RecommendationItem};
use crate::error::{check_response, ApiError};
use crate::traits::{
    AnimeRecordService, AuthService, CredentialProvider, ListRecord, ListRecordPatch,
    ListService, LocalAnimeRecord, LoginResponse, MalId, NewListRecord, NewLocalAnime, Profile,
    ProfilePatch, RecommendationService, RecordId, RegistrationFields, UserId, UserRecord,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1";

/// Client for the companion backend: accounts, local anime, lists, recommendations.
pub struct BackendClient {
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    http: Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            http: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Attach the current credential, read at request time.
    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match self.credentials.credential() {
            Some(token) => req.header("Authorization", format!("Bearer {token}")),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let resp = self.authorized(req).send().await?;
        check_response(resp).await
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, ApiError> {
        self.send(req)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

/// Read a message-only success body, which may be JSON or plain text.
async fn read_message(resp: reqwest::Response, fallback: &str) -> Result<String, ApiError> {
    let text = resp.text().await?;
    let message = match serde_json::from_str::<MessageBody>(&text) {
        Ok(body) => body.into_message(fallback),
        Err(_) if text.trim().is_empty() => fallback.to_string(),
        Err(_) => text.trim().to_string(),
    };
    Ok(message)
}

impl AuthService for BackendClient {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let req = self
            .http
            .post(self.url("/auth/login"))
            .json(&LoginRequest { username, password });
        let resp: LoginResponse = self.send_json(req).await.map_err(AuthError::from_login)?;
        tracing::info!(user_id = %resp.user.user_id, "Logged in");
        Ok(resp)
    }

    async fn register(&self, fields: &RegistrationFields) -> Result<UserRecord, AuthError> {
        let req = self.http.post(self.url("/users")).json(fields);
        self.send_json(req).await.map_err(AuthError::from_form)
    }

    async fn resend_verification(&self, user_id: UserId) -> Result<(), AuthError> {
        let req = self
            .http
            .post(self.url(&format!("/users/{user_id}/resend-verification")));
        self.send(req).await.map_err(AuthError::from_form)?;
        Ok(())
    }

    async fn request_password_reset(&self, email: &str) -> Result<String, AuthError> {
        let req = self
            .http
            .post(self.url("/password/forgot"))
            .query(&[("email", email)]);
        let resp = self.send(req).await.map_err(AuthError::from_form)?;
        Ok(read_message(resp, "Password reset email sent successfully.").await?)
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<String, AuthError> {
        let req = self
            .http
            .post(self.url("/password/reset"))
            .query(&[("token", token), ("newPassword", new_password)]);
        let resp = self.send(req).await.map_err(AuthError::from_reset)?;
        Ok(read_message(resp, "Password reset successful!").await?)
    }

    async fn verify_account(&self, token: &str) -> Result<String, AuthError> {
        let req = self
            .http
            .get(self.url("/users/verify"))
            .query(&[("token", token)]);
        let resp = self.send(req).await.map_err(AuthError::from_verify)?;
        Ok(read_message(resp, "Your account has been verified successfully!").await?)
    }

    async fn current_profile(&self) -> Result<Profile, AuthError> {
        let req = self.http.get(self.url("/users/me"));
        Ok(self.send_json(req).await?)
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        patch: &ProfilePatch,
    ) -> Result<UserRecord, AuthError> {
        let req = self
            .http
            .patch(self.url(&format!("/users/{user_id}")))
            .json(patch);
        self.send_json(req).await.map_err(AuthError::from_form)
    }
}

impl AnimeRecordService for BackendClient {
    async fn get_local_anime(&self, mal_id: MalId) -> Result<Option<LocalAnimeRecord>, ApiError> {
        let req = self.http.get(self.url(&format!("/anime/{mal_id}")));
        match self.send_json(req).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_local_anime(&self, anime: &NewLocalAnime) -> Result<LocalAnimeRecord, ApiError> {
        tracing::debug!(mal_id = anime.mal_id, "Mirroring catalog entry locally");
        let req = self.http.post(self.url("/anime")).json(anime);
        self.send_json(req).await
    }
}

impl ListService for BackendClient {
    async fn list_records(&self, user_id: UserId) -> Result<Vec<ListRecord>, ApiError> {
        let req = self
            .http
            .get(self.url("/user-anime"))
            .query(&[("userId", user_id.0)]);
        self.send_json(req).await
    }

    async fn create_record(&self, record: &NewListRecord) -> Result<ListRecord, ApiError> {
        let req = self.http.post(self.url("/user-anime")).json(record);
        self.send_json(req).await
    }

    async fn update_record(
        &self,
        record_id: RecordId,
        patch: &ListRecordPatch,
    ) -> Result<ListRecord, ApiError> {
        let req = self
            .http
            .patch(self.url(&format!("/user-anime/{record_id}")))
            .json(patch);
        self.send_json(req).await
    }

    async fn delete_record(&self, record_id: RecordId) -> Result<(), ApiError> {
        let req = self
            .http
            .delete(self.url(&format!("/user-anime/{record_id}")));
        self.send(req).await?;
        Ok(())
    }
}

impl RecommendationService for BackendClient {
    async fn recommendations(&self, user_id: UserId, safe_search: bool) -> Result<Vec<MalId>, ApiError> {
        tracing::debug!(%user_id, safe_search, "Requesting recommendations");
        let req = self
            .http
            .get(self.url("/recs/me"))
            .query(&[("safeSearch", safe_search)]);
        let items: Vec<RecommendationItem> = self.send_json(req).await?;
        Ok(items.into_iter().map(|i| i.mal_id).collect())
    }
}
