//! Authenticated JSON client for the asset-management API.
//!
//! Every request carries `Authorization: Bearer <access>` when a token is
//! stored. A 401 triggers one transparent refresh (coalesced across
//! concurrent callers by `RefreshGate`) and exactly one retry.

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use super::auth::TokenStore;
use super::refresh::RefreshGate;
use super::transport::{HttpRequest, HttpResponse, Transport};
use super::types::{Credentials, RefreshRequest, RefreshResponse, Registration, TokenPair, User};
use crate::error::{ApiError, AuthError, Error, Result, ValidationError};

pub const LOGIN_PATH: &str = "/auth/jwt/create/";
pub const REFRESH_PATH: &str = "/auth/jwt/refresh/";
pub const REGISTER_PATH: &str = "/auth/users/";
pub const CURRENT_USER_PATH: &str = "/auth/users/me/";

/// Session lifecycle notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LoggedIn,
    LoggedOut,
    /// Refresh failed or was impossible; credentials were cleared and the
    /// user has to sign in again.
    Expired,
}

/// HTTP client wrapper for the asset API.
pub struct ApiClient<T> {
    transport: T,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
    refresh_gate: RefreshGate,
    events: broadcast::Sender<SessionEvent>,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, base_url: &str, tokens: Arc<dyn TokenStore>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            refresh_gate: RefreshGate::new(),
            events,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Subscribe to session events (login, logout, forced re-authentication).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // ── Core request path ─────────────────────────────────────────────────

    /// Perform one authenticated request and return the decoded JSON body.
    ///
    /// 204 and empty bodies come back as `Value::Null`. Non-2xx responses
    /// surface as `Error::Api` with the server payload untouched.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(String, String)],
    ) -> Result<Value> {
        let mut request = HttpRequest::new(method, self.url(path));
        request.query = query.to_vec();
        request.body = body;

        let sent_with = self.tokens.access()?;
        request.bearer = sent_with.clone();
        let resp = self.dispatch(request.clone()).await?;

        if resp.status != 401 || is_auth_path(path) {
            return decode_value(resp);
        }

        log::info!("{} {} returned 401, refreshing session", request.method, path);
        let token = self.fresh_access_token(sent_with.as_deref()).await?;
        request.bearer = Some(token);
        let retried = self.dispatch(request).await?;
        decode_value(retried)
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str, query: &[(String, String)]) -> Result<R> {
        let value = self.request(Method::GET, path, None, query).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let value = self
            .request(Method::POST, path, Some(serde_json::to_value(body)?), &[])
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// POST without a body, e.g. restore actions.
    pub async fn post_empty<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let value = self.request(Method::POST, path, None, &[]).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn patch<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let value = self
            .request(Method::PATCH, path, Some(serde_json::to_value(body)?), &[])
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.request(Method::DELETE, path, None, &[]).await?;
        Ok(())
    }

    async fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.transport
            .send(request)
            .await
            .map_err(|e| Error::Network(e.to_string()))
    }

    /// Access token to retry with after a 401.
    ///
    /// If another caller already rotated the token since this request was
    /// sent, reuse it; otherwise go through the single-flight refresh.
    ///
    /// Store reads happen before the gate. A store that cannot be read fails
    /// the request with `Error::TokenStore` and leaves credentials untouched.
    async fn fresh_access_token(&self, sent_with: Option<&str>) -> Result<String> {
        if let Some(current) = self.tokens.access()? {
            if sent_with != Some(current.as_str()) {
                log::debug!("Access token already rotated, retrying with current token");
                return Ok(current);
            }
        }

        let refresh_token = self.tokens.refresh()?;
        let outcome = self.refresh_gate.run(|| self.refresh(refresh_token)).await;
        outcome.map_err(Error::from)
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// On any failure the stored credentials are cleared and `Expired` is
    /// broadcast.
    async fn refresh(&self, refresh_token: Option<String>) -> std::result::Result<String, AuthError> {
        let result = self.try_refresh(refresh_token).await;
        if let Err(ref e) = result {
            log::warn!("Session refresh failed: {}", e);
            if let Err(clear_err) = self.tokens.clear() {
                log::warn!("Failed to clear credentials: {}", clear_err);
            }
            let _ = self.events.send(SessionEvent::Expired);
        }
        result
    }

    async fn try_refresh(&self, refresh_token: Option<String>) -> std::result::Result<String, AuthError> {
        let refresh_token = refresh_token.ok_or(AuthError::NoRefreshToken)?;

        let body = serde_json::to_value(RefreshRequest {
            refresh: &refresh_token,
        })
        .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
        let mut request = HttpRequest::new(Method::POST, self.url(REFRESH_PATH));
        request.body = Some(body);

        let resp = self
            .transport
            .send(request)
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
        if !resp.is_success() {
            return Err(AuthError::RefreshRejected {
                status: resp.status,
            });
        }

        let refreshed: RefreshResponse = serde_json::from_slice(&resp.body)
            .map_err(|e| AuthError::RefreshFailed(format!("Failed to parse refresh response: {}", e)))?;
        let next_refresh = refreshed.refresh.unwrap_or(refresh_token);
        self.tokens
            .set_tokens(&refreshed.access, &next_refresh)
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        log::info!("Session refreshed");
        Ok(refreshed.access)
    }

    // ── Auth endpoints ────────────────────────────────────────────────────

    /// Sign in, store both tokens and return them with the current user.
    pub async fn login(&self, credentials: &Credentials) -> Result<(TokenPair, User)> {
        if credentials.username.trim().is_empty() {
            return Err(ValidationError::new("username", "Username is required").into());
        }
        if credentials.password.is_empty() {
            return Err(ValidationError::new("password", "Password is required").into());
        }

        let tokens: TokenPair = self.post(LOGIN_PATH, credentials).await?;
        self.tokens.set_tokens(&tokens.access, &tokens.refresh)?;

        let user = self.current_user().await?;
        let _ = self.events.send(SessionEvent::LoggedIn);
        log::info!("Signed in as {}", user.username);
        Ok((tokens, user))
    }

    pub async fn register(&self, registration: &Registration) -> Result<User> {
        if registration.password != registration.re_password {
            return Err(ValidationError::new("re_password", "Passwords do not match").into());
        }
        self.post(REGISTER_PATH, registration).await
    }

    pub async fn current_user(&self) -> Result<User> {
        self.get(CURRENT_USER_PATH, &[]).await
    }

    /// Drop the stored credentials. Purely local; the backend keeps no session.
    pub fn logout(&self) -> Result<()> {
        self.tokens.clear()?;
        let _ = self.events.send(SessionEvent::LoggedOut);
        log::info!("Signed out");
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn is_auth_path(path: &str) -> bool {
    path == LOGIN_PATH || path == REFRESH_PATH
}

fn decode_value(resp: HttpResponse) -> Result<Value> {
    if !resp.is_success() {
        return Err(ApiError::from_body(resp.status, &resp.body).into());
    }
    if resp.status == 204 || resp.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&resp.body)?)
}

/// Percent-encode an id for use as a path segment.
pub fn segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}
