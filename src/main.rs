//! authwire - JWT-authenticated HTTP client
//!
//! Thin CLI over the library: log in to get a credential pair, then issue
//! requests that carry (and transparently renew) the access token.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::Method;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use authwire::api::{AuthHttp, Request};
use authwire::auth::{AuthConfig, SessionService, DEFAULT_RENEW_PATH};
use authwire::handler::{GlobalErrorHandler, HandlerOptions, HttpErrorSink, Navigator};
use authwire::jwt::{EXPIRY_OFFSET_SECS, NO_EXPIRATION};
use authwire::store::{FileStore, TokenStore};

#[derive(Parser)]
#[command(name = "authwire")]
#[command(about = "JWT-authenticated HTTP client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server base URL
    #[arg(long, global = true, default_value = "http://localhost:8080")]
    url: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the credential pair
    Login {
        username: String,
        password: String,

        /// Login endpoint path
        #[arg(long, default_value = "/api/v1/auth/login")]
        path: String,

        /// Legacy single-token mode (no refresh flow)
        #[arg(long)]
        single_token: bool,
    },

    /// Log out and clear stored credentials
    Logout,

    /// Show credential status
    Status,

    /// Issue an authenticated GET request
    Get {
        /// Path or absolute URL
        path: String,
    },

    /// Issue an authenticated POST request with a JSON body
    Post {
        /// Path or absolute URL
        path: String,

        /// Request body (JSON)
        body: String,
    },
}

/// In a terminal there is no login route to navigate to; tell the user.
struct LoginPrompt;

impl Navigator for LoginPrompt {
    fn to_login(&self) {
        eprintln!("Session ended. Run 'authwire login' to authenticate.");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Login {
            username,
            password,
            path,
            single_token,
        } => {
            let store = open_store()?;
            let session = if single_token {
                SessionService::single_token(store)
            } else {
                SessionService::new(store)
            };
            let url = absolute(&cli.url, &path);
            if session.login(&url, &username, &password).await? {
                println!("Login successful.");
            } else {
                println!("Login failed: server did not return a token pair.");
            }
        }
        Commands::Logout => {
            SessionService::new(open_store()?).logout()?;
            println!("Logged out.");
        }
        Commands::Status => {
            print_status(&open_store()?);
        }
        Commands::Get { path } => {
            let request = Request::new(Method::GET, absolute(&cli.url, &path));
            run_request(&cli.url, request).await?;
        }
        Commands::Post { path, body } => {
            let body: serde_json::Value = serde_json::from_str(&body)?;
            let request = Request::new(Method::POST, absolute(&cli.url, &path)).json(body);
            run_request(&cli.url, request).await?;
        }
    }

    Ok(())
}

/// The CLI has no ephemeral scope that outlives a command, so both slots
/// share the durable file.
fn open_store() -> Result<TokenStore> {
    let file = Arc::new(FileStore::open_default()?);
    Ok(TokenStore::new(file.clone(), file))
}

fn absolute(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("{}{}", base.trim_end_matches('/'), path)
    }
}

async fn run_request(base: &str, request: Request) -> Result<()> {
    let store = open_store()?;
    let config = AuthConfig::builder()
        .renew_url(absolute(base, DEFAULT_RENEW_PATH))
        .build();
    let client = AuthHttp::new(config, store.clone());

    match client.send(request).await {
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            println!("{}", body);
            if !status.is_success() {
                anyhow::bail!("HTTP {}", status.as_u16());
            }
        }
        Err(error) => {
            let session = SessionService::new(store);
            let sink = Arc::new(HttpErrorSink::new(absolute(base, "/error-logging-endpoint")));
            let options = HandlerOptions {
                rethrow: true,
                unwrap: false,
            };
            let handler = GlobalErrorHandler::new(options, sink, session, Arc::new(LoginPrompt));
            if let Some(error) = handler.handle_error(error) {
                return Err(error.into());
            }
        }
    }

    Ok(())
}

fn print_status(store: &TokenStore) {
    match store.read_access() {
        Some(record) if !record.is_expired(EXPIRY_OFFSET_SECS) => {
            println!("Access token:  valid (user: {})", record.username);
            if record.exp != NO_EXPIRATION {
                println!("  expires_at: {}", record.exp);
            }
        }
        Some(_) => println!("Access token:  expired"),
        None => println!("Access token:  none"),
    }

    match store.read_refresh() {
        Some(record) if !record.is_expired(EXPIRY_OFFSET_SECS) => {
            println!("Refresh token: valid (user: {})", record.username);
            if record.exp != NO_EXPIRATION {
                println!("  expires_at: {}", record.exp);
            }
        }
        Some(_) => println!("Refresh token: expired"),
        None => println!("Refresh token: none"),
    }

    if store.read_refresh().is_none() {
        println!("\nRun 'authwire login' to authenticate.");
    }
}
