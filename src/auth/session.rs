//! Login and logout session orchestration

use serde::Deserialize;
use serde_json::json;

use crate::error::AuthError;
use crate::jwt::{self, EXPIRY_OFFSET_SECS};
use crate::store::{CredentialRecord, TokenStore};

const JSON_UTF8: &str = "application/json;charset=UTF-8";

/// Login endpoint response. Legacy servers return a single `token` field
/// instead of the pair.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    token: Option<String>,
}

/// Exchanges credentials for a token pair and owns session teardown.
#[derive(Clone)]
pub struct SessionService {
    http: reqwest::Client,
    store: TokenStore,
    single_token: bool,
}

impl SessionService {
    pub fn new(store: TokenStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            store,
            single_token: false,
        }
    }

    /// Legacy variant: one credential in the access slot, no refresh flow.
    pub fn single_token(store: TokenStore) -> Self {
        Self {
            single_token: true,
            ..Self::new(store)
        }
    }

    /// POST credentials to `url` and persist the returned token pair.
    ///
    /// Returns `true` only when the response carries everything the active
    /// mode needs; otherwise `false` with nothing written (no partial
    /// state). Transport failures and non-2xx statuses propagate.
    pub async fn login(
        &self,
        url: &str,
        username: &str,
        password: &str,
    ) -> Result<bool, AuthError> {
        tracing::debug!("POST {} (login)", url);
        let response = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, JSON_UTF8)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?
            .error_for_status()?;

        let body: LoginResponse = response.json().await?;

        if self.single_token {
            let Some(token) = body.token.or(body.access_token) else {
                tracing::info!("Login response carried no token");
                return Ok(false);
            };
            // Legacy tokens may be opaque; treat them as never-expiring
            let exp = jwt::get_expiration(&token).unwrap_or(jwt::NO_EXPIRATION);
            self.store
                .write_access(&CredentialRecord::new(username, token, exp))?;
            tracing::info!("Logged in (single-token mode)");
            return Ok(true);
        }

        let (Some(access), Some(refresh)) = (body.access_token, body.refresh_token) else {
            tracing::info!("Login response missing token pair");
            return Ok(false);
        };

        // An undecodable token is still stored; its expiration is simply
        // unknown and it will ride until a server rejects it
        let access_exp = jwt::get_expiration(&access).unwrap_or(jwt::NO_EXPIRATION);
        let refresh_exp = jwt::get_expiration(&refresh).unwrap_or(jwt::NO_EXPIRATION);
        self.store
            .write_access(&CredentialRecord::new(username, access, access_exp))?;
        self.store
            .write_refresh(&CredentialRecord::new(username, refresh, refresh_exp))?;
        tracing::info!("Logged in as {}", username);
        Ok(true)
    }

    /// Clear both credential slots. Idempotent.
    pub fn logout(&self) -> Result<(), AuthError> {
        tracing::info!("Clearing session");
        self.store.clear_all()
    }

    /// Is the user within a renewable session? True when the refresh record
    /// exists and has not expired (access record in single-token mode).
    /// This is not "is the access token currently valid".
    pub fn has_credentials(&self) -> bool {
        let record = if self.single_token {
            self.store.read_access()
        } else {
            self.store.read_refresh()
        };
        record.is_some_and(|r| !r.is_expired(EXPIRY_OFFSET_SECS))
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }
}
