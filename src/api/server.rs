//! API server setup.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing, timeout, password auth)
//! - Serve over TLS when a certificate and key are present, plain HTTP
//!   otherwise
//! - Stop gracefully when the run's lifetime is cancelled

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use sea_orm::DatabaseConnection;
use tokio::net::{lookup_host, TcpListener};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::api::auth::password_auth_middleware;
use crate::api::handlers::{get_events, get_health};
use crate::api::tls::{load_tls_config, tls_paths};
use crate::config::ServerSettings;
use crate::lifecycle::Lifetime;

/// In-flight requests get this long to finish once shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub password: Arc<str>,
}

/// HTTP API over the ingested node events.
pub struct ApiServer {
    router: Router,
    settings: ServerSettings,
}

impl ApiServer {
    pub fn new(settings: &ServerSettings, db: DatabaseConnection) -> Self {
        let state = AppState {
            db,
            password: Arc::from(settings.password.as_str()),
        };
        Self {
            router: build_router(settings, state),
            settings: settings.clone(),
        }
    }

    /// Serve until `lifetime` is cancelled.
    pub async fn run(self, lifetime: Lifetime) -> Result<(), std::io::Error> {
        let addr = resolve(&self.settings).await?;

        match tls_paths(&self.settings) {
            Some((cert, key)) => {
                let tls = load_tls_config(cert, key).await?;
                let handle = axum_server::Handle::new();

                let shutdown = handle.clone();
                let cancelled = lifetime.cancelled();
                tokio::spawn(async move {
                    cancelled.await;
                    shutdown.graceful_shutdown(Some(DRAIN_TIMEOUT));
                });

                tracing::info!(address = %addr, tls = true, "API server starting");
                axum_server::bind_rustls(addr, tls)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await?;
            }
            None => {
                let listener = TcpListener::bind(addr).await?;
                tracing::info!(address = %addr, tls = false, "API server starting");
                axum::serve(listener, self.router)
                    .with_graceful_shutdown(lifetime.cancelled())
                    .await?;
            }
        }

        tracing::info!("API server stopped");
        Ok(())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(settings: &ServerSettings, state: AppState) -> Router {
    let api = Router::new()
        .route("/api/events", get(get_events))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            password_auth_middleware,
        ));

    Router::new()
        .route("/health", get(get_health))
        .merge(api)
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(settings.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
}

async fn resolve(settings: &ServerSettings) -> Result<SocketAddr, std::io::Error> {
    lookup_host((settings.host.as_str(), settings.port))
        .await?
        .next()
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("no address for {}:{}", settings.host, settings.port),
            )
        })
}
