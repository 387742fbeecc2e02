//! Error taxonomy for the auth client
//!
//! Every failure the library surfaces is a tagged variant carrying an
//! explicit kind and, where applicable, an HTTP-like status. Raw transport
//! errors are wrapped at the boundary where they are first observed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The string handed to the codec is not a decodable JWT. Fatal to the
    /// specific decode call only, never to the process.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// No refresh credential is available; the caller must redirect to the
    /// login entry point.
    #[error("no refresh credential available, login required")]
    AuthRequired,

    /// The server rejected the refresh token during renewal.
    #[error("auth error {status}: {message}")]
    AuthHttp { status: u16, message: String },

    /// Network/HTTP failure unrelated to auth, propagated verbatim.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Durable credential slot I/O failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// HTTP-like status for classification by the error handler.
    ///
    /// Transport errors that produced a response report its status; ones
    /// that never reached the server (connect failures, timeouts) report 0.
    /// `AuthRequired` reports 401 since it means the same thing a server
    /// 401 does: the session is over.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::AuthHttp { status, .. } => Some(*status),
            AuthError::AuthRequired => Some(401),
            AuthError::Transport(e) => Some(e.status().map_or(0, |s| s.as_u16())),
            AuthError::MalformedToken(_) | AuthError::Storage(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_for_auth_variants() {
        let err = AuthError::AuthHttp {
            status: 401,
            message: "JWT is invalid or has expired".into(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(AuthError::AuthRequired.status(), Some(401));
    }

    #[test]
    fn test_no_status_for_local_failures() {
        assert_eq!(AuthError::MalformedToken("x".into()).status(), None);
        assert_eq!(AuthError::Storage("disk".into()).status(), None);
    }
}
