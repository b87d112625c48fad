//! cfsd-http — the daemon's HTTP surface.
//!
//! Read-only views over the refresh controller's status channel. The
//! target file itself is served to Prometheus through the filesystem,
//! not over HTTP.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Static liveness text |
//! | GET | `/status` | Refresh status as JSON |
//! | GET | `/metrics` | Refresh counters, Prometheus text format |

pub mod handlers;
pub mod prometheus;

use axum::Router;
use axum::routing::get;
use tokio::sync::watch;

use cfsd_refresh::RefreshStatus;

pub use handlers::BANNER;

/// Shared state for handlers.
#[derive(Clone)]
pub struct HttpState {
    pub status: watch::Receiver<RefreshStatus>,
}

/// Build the router over a status receiver.
pub fn build_router(status: watch::Receiver<RefreshStatus>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/status", get(handlers::status))
        .route("/metrics", get(handlers::prometheus_metrics))
        .with_state(HttpState { status })
}
