//! HTTP dispatch layer.
//!
//! A thin axum router mapping methods and paths onto [`Depot`] operations:
//!
//! | Route                    | Methods                     |
//! |--------------------------|-----------------------------|
//! | `/artifacts/{*path}`     | GET, HEAD, POST, DELETE     |
//! | `/directories`           | GET                         |
//! | `/shares`                | PUT                         |
//! | `/shares/{token}`        | GET, DELETE                 |
//!
//! Requests carry no session; a lookup token (`?token=` or a `token` form
//! field) is the only way to authenticate.

mod handlers;

use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, get, put},
};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::Error;
use crate::service::Depot;

/// Methods accepted on `/artifacts`.
const ARTIFACT_METHODS: &str = "DELETE, GET, HEAD, POST";

/// Error returned by handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Depot(#[from] Error),

    /// Malformed request body, rejected before reaching the depot
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Depot(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(%status, error = %self, "Request rejected");
        }

        let mut response = (status, self.to_string()).into_response();
        if status == StatusCode::METHOD_NOT_ALLOWED {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(ARTIFACT_METHODS));
        }
        response
    }
}

/// Builds the router with `max_upload_bytes` as request body limit.
pub fn router(depot: Depot, max_upload_bytes: u64) -> Router {
    let limit = usize::try_from(max_upload_bytes).unwrap_or(usize::MAX);
    Router::new()
        .route("/artifacts", any(handlers::artifacts_root))
        .route("/artifacts/", any(handlers::artifacts_root))
        .route("/artifacts/{*path}", any(handlers::artifacts))
        .route("/directories", get(handlers::directories))
        .route("/shares", put(handlers::share_create))
        .route(
            "/shares/{token}",
            get(handlers::share_get).delete(handlers::share_delete),
        )
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(depot)
}

/// Serves the depot until Ctrl+C, running the scheduled clean alongside.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(depot: Depot, config: &Config) -> anyhow::Result<()> {
    let addr = config.bind_addr()?;

    let cleaner = match config.retention.clean_interval_secs {
        0 => None,
        secs => Some(tokio::spawn(run_scheduled_clean(
            depot.clone(),
            Duration::from_secs(secs),
        ))),
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Depot listening");

    let app = router(depot, config.server.max_upload_bytes);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down");
        })
        .await?;

    if let Some(cleaner) = cleaner {
        cleaner.abort();
    }
    Ok(())
}

/// Runs `clean` every `period`. Failures are logged and retried next tick.
pub async fn run_scheduled_clean(depot: Depot, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(interval = ?period, "Starting scheduled clean loop");

    loop {
        interval.tick().await;
        match depot.clean_async().await {
            Ok(report) => tracing::info!(
                removed = report.removed(),
                pruned = report.pruned_dirs,
                "Scheduled clean done"
            ),
            Err(e) => tracing::warn!(error = %e, "Scheduled clean failed"),
        }
    }
}
