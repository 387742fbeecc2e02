//! Authentication configuration and session management

pub mod session;

pub use session::SessionService;

use std::sync::Arc;

/// Default auth header name.
pub const DEFAULT_HEADER_NAME: &str = "Authorization";
/// Default auth scheme prefix (trailing space included).
pub const HEADER_PREFIX_BEARER: &str = "Bearer ";
/// Default renewal endpoint path, relative to the server origin.
pub const DEFAULT_RENEW_PATH: &str = "/api/v1/auth/renew";

/// Override for how the dispatcher obtains the current token.
/// The default (no getter) reads the access credential slot.
pub type TokenGetter = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Immutable dispatcher configuration. Built once; reconfiguring means
/// constructing a new dispatcher.
#[derive(Clone)]
pub struct AuthConfig {
    pub header_name: String,
    /// Fully resolved prefix, trailing space already applied.
    pub header_prefix: String,
    /// Headers merged into every request; never overwrite headers the
    /// caller set explicitly.
    pub global_headers: Vec<(String, String)>,
    pub renew_url: String,
    pub token_getter: Option<TokenGetter>,
    /// Legacy mode: the access record is the sole credential and the
    /// renewal sub-protocol is disabled entirely.
    pub single_token: bool,
}

impl AuthConfig {
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Default)]
pub struct AuthConfigBuilder {
    header_name: Option<String>,
    header_prefix: Option<String>,
    no_token_scheme: bool,
    global_headers: Vec<(String, String)>,
    renew_url: Option<String>,
    token_getter: Option<TokenGetter>,
    single_token: bool,
}

impl AuthConfigBuilder {
    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = Some(name.into());
        self
    }

    /// Custom scheme prefix; a single trailing space is appended at build.
    pub fn header_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.header_prefix = Some(prefix.into());
        self
    }

    /// Attach the bare token with no scheme prefix.
    pub fn no_token_scheme(mut self) -> Self {
        self.no_token_scheme = true;
        self
    }

    pub fn global_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.global_headers.push((name.into(), value.into()));
        self
    }

    pub fn renew_url(mut self, url: impl Into<String>) -> Self {
        self.renew_url = Some(url.into());
        self
    }

    pub fn token_getter(mut self, getter: TokenGetter) -> Self {
        self.token_getter = Some(getter);
        self
    }

    pub fn single_token(mut self) -> Self {
        self.single_token = true;
        self
    }

    pub fn build(self) -> AuthConfig {
        // An explicit prefix wins over no_token_scheme, matching the
        // original header contract.
        let header_prefix = match (self.header_prefix, self.no_token_scheme) {
            (Some(prefix), _) => format!("{} ", prefix),
            (None, true) => String::new(),
            (None, false) => HEADER_PREFIX_BEARER.to_string(),
        };

        AuthConfig {
            header_name: self
                .header_name
                .unwrap_or_else(|| DEFAULT_HEADER_NAME.to_string()),
            header_prefix,
            global_headers: self.global_headers,
            renew_url: self
                .renew_url
                .unwrap_or_else(|| DEFAULT_RENEW_PATH.to_string()),
            token_getter: self.token_getter,
            single_token: self.single_token,
        }
    }
}
