//! Process-wide error handling
//!
//! Classifies failures, forwards them to a log sink, and on authentication
//! failures tears down the session and redirects to the login entry point.
//! Built once at startup and lives for the process lifetime.

use std::error::Error as StdError;
use std::sync::Arc;

use crate::auth::SessionService;
use crate::error::AuthError;

/// Remote/aggregation log collaborator. A failing sink is swallowed with a
/// warning; the handler must never crash on a logging problem.
pub trait ErrorSink: Send + Sync {
    fn log_error(&self, error: &(dyn StdError + 'static)) -> anyhow::Result<()>;
}

/// Navigation collaborator invoked on auth failures.
pub trait Navigator: Send + Sync {
    fn to_login(&self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HandlerOptions {
    /// Hand the error back to the caller after handling instead of
    /// swallowing it.
    pub rethrow: bool,
    /// Report the root of the cause chain to the sink instead of the
    /// outermost wrapper.
    pub unwrap: bool,
}

pub struct GlobalErrorHandler {
    options: HandlerOptions,
    sink: Arc<dyn ErrorSink>,
    session: SessionService,
    navigator: Arc<dyn Navigator>,
}

impl GlobalErrorHandler {
    pub fn new(
        options: HandlerOptions,
        sink: Arc<dyn ErrorSink>,
        session: SessionService,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            options,
            sink,
            session,
            navigator,
        }
    }

    /// Handle one error end to end: log locally, forward to the sink,
    /// classify, and on an auth failure clear the session and navigate to
    /// login exactly once. Returns the error back only when `rethrow` is
    /// set; otherwise it is considered handled.
    pub fn handle_error(&self, error: AuthError) -> Option<AuthError> {
        tracing::error!("{}", error);
        let mut cause: &(dyn StdError + 'static) = &error;
        while let Some(source) = cause.source() {
            tracing::error!("  caused by: {}", source);
            cause = source;
        }

        let reported: &(dyn StdError + 'static) = if self.options.unwrap {
            find_root(&error)
        } else {
            &error
        };
        if let Err(sink_error) = self.sink.log_error(reported) {
            tracing::warn!("Error sink failed: {:#}", sink_error);
        }

        if let Some(status) = error.status() {
            if is_unauthorized(status) {
                tracing::info!(status, "Authentication failure, tearing down session");
                if let Err(e) = self.session.logout() {
                    tracing::warn!("Session teardown failed: {}", e);
                }
                self.navigator.to_login();
            }
        }

        if self.options.rethrow {
            Some(error)
        } else {
            None
        }
    }
}

/// Follow the cause chain to the underlying error.
fn find_root<'a>(error: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current
}

/// Status 0 means the request never reached the server (blocked before
/// transport); treated conservatively as an auth failure.
fn is_unauthorized(status: u16) -> bool {
    status == 0 || status == 401 || status == 403
}

/// Sink that ships error reports to a server-side logging endpoint.
/// Fire-and-forget: the POST runs on a detached task and its own failure
/// is only warned about.
pub struct HttpErrorSink {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpErrorSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl ErrorSink for HttpErrorSink {
    fn log_error(&self, error: &(dyn StdError + 'static)) -> anyhow::Result<()> {
        let report = serde_json::json!({
            "message": error.to_string(),
            "cause": error.source().map(|c| c.to_string()),
        });
        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            if let Err(e) = http.post(&endpoint).json(&report).send().await {
                tracing::warn!("Failed to ship error report: {}", e);
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TokenStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<String>>,
        fail: bool,
    }

    impl ErrorSink for RecordingSink {
        fn log_error(&self, error: &(dyn StdError + 'static)) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("sink unavailable");
            }
            self.messages.lock().unwrap().push(error.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNavigator {
        visits: AtomicUsize,
    }

    impl Navigator for RecordingNavigator {
        fn to_login(&self) {
            self.visits.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn make_handler(
        options: HandlerOptions,
        sink: Arc<RecordingSink>,
        navigator: Arc<RecordingNavigator>,
    ) -> (GlobalErrorHandler, TokenStore) {
        let store = TokenStore::in_memory();
        let session = SessionService::new(store.clone());
        let handler = GlobalErrorHandler::new(options, sink, session, navigator);
        (handler, store)
    }

    #[test]
    fn test_forbidden_clears_session_and_navigates_once() {
        let sink = Arc::new(RecordingSink::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let (handler, store) =
            make_handler(HandlerOptions::default(), sink.clone(), navigator.clone());

        store
            .write_refresh(&crate::store::CredentialRecord::new("alice", "d.e.f", -1))
            .unwrap();

        let handled = handler.handle_error(AuthError::AuthHttp {
            status: 403,
            message: "forbidden".into(),
        });

        assert!(handled.is_none());
        assert_eq!(navigator.visits.load(Ordering::SeqCst), 1);
        assert!(store.read_refresh().is_none());
        assert_eq!(sink.messages.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_non_auth_error_does_not_navigate() {
        let sink = Arc::new(RecordingSink::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let (handler, _store) =
            make_handler(HandlerOptions::default(), sink.clone(), navigator.clone());

        handler.handle_error(AuthError::MalformedToken("bad".into()));

        assert_eq!(navigator.visits.load(Ordering::SeqCst), 0);
        assert_eq!(sink.messages.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_auth_required_navigates() {
        let sink = Arc::new(RecordingSink::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let (handler, _store) = make_handler(HandlerOptions::default(), sink, navigator.clone());

        handler.handle_error(AuthError::AuthRequired);

        assert_eq!(navigator.visits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rethrow_returns_error() {
        let sink = Arc::new(RecordingSink::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let options = HandlerOptions {
            rethrow: true,
            unwrap: false,
        };
        let (handler, _store) = make_handler(options, sink, navigator);

        let back = handler.handle_error(AuthError::AuthHttp {
            status: 401,
            message: "expired".into(),
        });
        assert!(matches!(back, Some(AuthError::AuthHttp { status: 401, .. })));
    }

    #[test]
    fn test_failing_sink_is_swallowed() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let navigator = Arc::new(RecordingNavigator::default());
        let (handler, _store) =
            make_handler(HandlerOptions::default(), sink, navigator.clone());

        // Must not panic or escalate; classification still runs
        let handled = handler.handle_error(AuthError::AuthHttp {
            status: 401,
            message: "expired".into(),
        });
        assert!(handled.is_none());
        assert_eq!(navigator.visits.load(Ordering::SeqCst), 1);
    }
}
