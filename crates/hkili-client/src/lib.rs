//! Typed client for the HKILI REST API, the service layer the mobile app
//! talks through.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use hkili_types::api::{
    AuthResponse, CharacterRequest, DeleteResponse, ErrorBody, LoginRequest, RegisterRequest,
    StoryPatch, StoryRequest,
};
use hkili_types::models::{Category, Character, Story, User};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("not logged in")]
    NotLoggedIn,
}

pub type ClientResult<T> = Result<T, ClientError>;

pub struct StoryService {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl StoryService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Use a token obtained elsewhere (e.g. restored from device storage).
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn logout(&mut self) {
        self.token = None;
    }

    // -- Auth --

    pub async fn login(&mut self, email: &str, password: &str) -> ClientResult<User> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse = self.send_public(Method::POST, "/api/auth/login", Some(&body)).await?;
        self.token = Some(auth.token);
        Ok(auth.user)
    }

    pub async fn register(
        &mut self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> ClientResult<User> {
        let body = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.map(str::to_string),
        };
        let auth: AuthResponse =
            self.send_public(Method::POST, "/api/auth/register", Some(&body)).await?;
        self.token = Some(auth.token);
        Ok(auth.user)
    }

    pub async fn me(&self) -> ClientResult<User> {
        self.send(Method::GET, "/api/auth/me", None::<&()>).await
    }

    // -- Stories --

    pub async fn list_stories(&self) -> ClientResult<Vec<Story>> {
        self.send(Method::GET, "/api/stories", None::<&()>).await
    }

    pub async fn get_story(&self, id: Uuid) -> ClientResult<Story> {
        self.send(Method::GET, &format!("/api/stories/{id}"), None::<&()>).await
    }

    pub async fn create_story(&self, story: &StoryRequest) -> ClientResult<Story> {
        self.send(Method::POST, "/api/stories", Some(story)).await
    }

    pub async fn update_story(&self, id: Uuid, story: &StoryRequest) -> ClientResult<Story> {
        self.send(Method::PUT, &format!("/api/stories/{id}"), Some(story)).await
    }

    pub async fn set_favorite(&self, id: Uuid, favorite: bool) -> ClientResult<Story> {
        let patch = StoryPatch {
            is_favorite: Some(favorite),
            ..Default::default()
        };
        self.send(Method::PATCH, &format!("/api/stories/{id}"), Some(&patch)).await
    }

    pub async fn delete_story(&self, id: Uuid) -> ClientResult<bool> {
        let res: DeleteResponse = self
            .send(Method::DELETE, &format!("/api/stories/{id}"), None::<&()>)
            .await?;
        Ok(res.deleted)
    }

    // -- Characters --

    pub async fn list_characters(&self) -> ClientResult<Vec<Character>> {
        self.send(Method::GET, "/api/characters", None::<&()>).await
    }

    pub async fn create_character(&self, character: &CharacterRequest) -> ClientResult<Character> {
        self.send(Method::POST, "/api/characters", Some(character)).await
    }

    pub async fn delete_character(&self, id: Uuid) -> ClientResult<bool> {
        let res: DeleteResponse = self
            .send(Method::DELETE, &format!("/api/characters/{id}"), None::<&()>)
            .await?;
        Ok(res.deleted)
    }

    // -- Categories --

    pub async fn list_categories(&self) -> ClientResult<Vec<Category>> {
        self.send(Method::GET, "/api/categories", None::<&()>).await
    }

    // -- Plumbing --

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.token.as_deref().ok_or(ClientError::NotLoggedIn)?;
        let req = self.request(method, path, body).bearer_auth(token);
        decode(req.send().await?).await
    }

    async fn send_public<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        decode(self.request(method, path, body).send().await?).await
    }

    fn request<B>(&self, method: Method, path: &str, body: Option<&B>) -> RequestBuilder
    where
        B: Serialize + ?Sized,
    {
        debug!("{} {}{}", method, self.base_url, path);
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        match body {
            Some(body) => req.json(body),
            None => req,
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    // Error bodies are `{"error": "..."}`; fall back to the raw text.
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text);
    Err(ClientError::Api { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let svc = StoryService::new("http://localhost:3000/");
        assert_eq!(svc.base_url, "http://localhost:3000");
        assert!(svc.token().is_none());
    }

    #[tokio::test]
    async fn protected_calls_need_a_token() {
        let svc = StoryService::new("http://127.0.0.1:9");
        let err = svc.list_stories().await.unwrap_err();
        assert!(matches!(err, ClientError::NotLoggedIn));
    }
}
