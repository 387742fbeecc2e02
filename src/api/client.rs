//! Authenticated HTTP dispatcher
//!
//! Wraps reqwest::Client with automatic token injection and renewal. Every
//! verb funnels through [`AuthHttp::send`], which renews an expired access
//! token before the request ever leaves the process.

use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use crate::auth::AuthConfig;
use crate::error::AuthError;
use crate::jwt::{self, EXPIRY_OFFSET_SECS};
use crate::store::{CredentialRecord, TokenStore};

const JSON_UTF8: &str = "application/json;charset=UTF-8";

/// Renewal endpoint response. Legacy servers return the new access token
/// under `token` instead of `accessToken`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenewResponse {
    #[serde(default)]
    login_required: bool,
    access_token: Option<String>,
    token: Option<String>,
}

/// Outgoing request envelope.
///
/// Owned by the caller until handed to [`AuthHttp::send`]; the dispatcher
/// builds the wire request from a borrow and never mutates the envelope,
/// so retrying with the same envelope is safe.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Token-aware HTTP client.
pub struct AuthHttp {
    http: reqwest::Client,
    config: AuthConfig,
    store: TokenStore,
    /// Serializes renewal so concurrent sends racing one expired token
    /// issue a single round trip.
    renew_lock: Mutex<()>,
}

impl AuthHttp {
    pub fn new(config: AuthConfig, store: TokenStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            store,
            renew_lock: Mutex::new(()),
        }
    }

    pub async fn get(&self, url: &str) -> Result<reqwest::Response, AuthError> {
        self.send(Request::new(Method::GET, url)).await
    }

    pub async fn post(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, AuthError> {
        self.send(Request::new(Method::POST, url).json(body)).await
    }

    pub async fn put(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, AuthError> {
        self.send(Request::new(Method::PUT, url).json(body)).await
    }

    pub async fn patch(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, AuthError> {
        self.send(Request::new(Method::PATCH, url).json(body)).await
    }

    pub async fn delete(&self, url: &str) -> Result<reqwest::Response, AuthError> {
        self.send(Request::new(Method::DELETE, url)).await
    }

    pub async fn head(&self, url: &str) -> Result<reqwest::Response, AuthError> {
        self.send(Request::new(Method::HEAD, url)).await
    }

    pub async fn options(&self, url: &str) -> Result<reqwest::Response, AuthError> {
        self.send(Request::new(Method::OPTIONS, url)).await
    }

    /// Dispatch one request, renewing the access token first if needed.
    ///
    /// Without a stored token the request goes out unauthenticated; a
    /// 401-class response to that is the caller's to handle, not an error
    /// here. Renewal, when triggered, completes before the auth header is
    /// attached, so a token known to be expired is never sent.
    pub async fn send(&self, request: Request) -> Result<reqwest::Response, AuthError> {
        let token = self.current_token().await?;

        let mut builder = self.http.request(request.method.clone(), &request.url);

        if let Some(token) = &token {
            builder = builder.header(
                self.config.header_name.as_str(),
                format!("{}{}", self.config.header_prefix, token),
            );
        }

        // Global headers never overwrite ones the caller set explicitly
        for (name, value) in &self.config.global_headers {
            let caller_set = request
                .headers
                .iter()
                .any(|(n, _)| n.eq_ignore_ascii_case(name));
            if !caller_set {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!("{} {}", request.method, request.url);
        Ok(builder.send().await?)
    }

    /// Resolve the token to attach. `None` means send unauthenticated.
    async fn current_token(&self) -> Result<Option<String>, AuthError> {
        let (token, exp) = match &self.config.token_getter {
            Some(getter) => match getter() {
                Some(token) => {
                    let exp = jwt::get_expiration(&token).unwrap_or(jwt::NO_EXPIRATION);
                    (token, exp)
                }
                None => return Ok(None),
            },
            None => match self.store.read_access() {
                Some(record) => (record.token, record.exp),
                None => return Ok(None),
            },
        };

        if self.config.single_token || !jwt::is_expired(exp, EXPIRY_OFFSET_SECS) {
            return Ok(Some(token));
        }

        self.renew().await.map(Some)
    }

    /// Renewal sub-protocol: trade the refresh token for a new access token
    /// and commit it to the access slot.
    ///
    /// Concurrent callers coalesce on the lock; waiters re-check the slot
    /// after acquiring it and reuse the record the winner committed. The
    /// round trip runs on a detached task so an abandoned caller does not
    /// cancel a renewal other pending requests may depend on.
    async fn renew(&self) -> Result<String, AuthError> {
        let _guard = self.renew_lock.lock().await;

        if let Some(record) = self.store.read_access() {
            if !record.is_expired(EXPIRY_OFFSET_SECS) {
                return Ok(record.token);
            }
        }

        let refresh = self.store.read_refresh().ok_or(AuthError::AuthRequired)?;

        tracing::info!("Access token expired, renewing");
        let http = self.http.clone();
        let renew_url = self.config.renew_url.clone();
        let store = self.store.clone();
        let handle =
            tokio::spawn(async move { renew_round_trip(http, renew_url, store, refresh).await });

        match handle.await {
            Ok(result) => result,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}

async fn renew_round_trip(
    http: reqwest::Client,
    renew_url: String,
    store: TokenStore,
    refresh: CredentialRecord,
) -> Result<String, AuthError> {
    let response = http
        .post(&renew_url)
        .header(CONTENT_TYPE, JSON_UTF8)
        .json(&json!({ "refreshToken": refresh.token }))
        .send()
        .await?
        .error_for_status()?;

    let body: RenewResponse = response.json().await?;

    let token = match body.access_token.or(body.token) {
        Some(token) if !body.login_required => token,
        // The refresh token itself is dead; no retry
        _ => {
            return Err(AuthError::AuthHttp {
                status: 401,
                message: "JWT is invalid or has expired".to_string(),
            })
        }
    };

    let exp = jwt::get_expiration(&token)?;
    store.write_access(&CredentialRecord::new(refresh.username, token.clone(), exp))?;
    tracing::info!("Access token renewed");
    Ok(token)
}
