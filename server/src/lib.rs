//! HTTP surface for the Clawsec engine.
//!
//! Five endpoints with deterministic responses:
//!
//! | Method | Path           | Purpose                       |
//! |--------|----------------|-------------------------------|
//! | POST   | `/analyze`     | Evaluate one tool call        |
//! | POST   | `/approve/:id` | Approve a pending record      |
//! | POST   | `/deny/:id`    | Deny a pending record         |
//! | GET    | `/status`      | Liveness and counters         |
//! | GET    | `/health`      | `{"status":"ok"}`             |

mod routes;
mod state;

pub use routes::router;
pub use state::{AppState, ServerConfig};

use std::sync::Arc;

use clawsec_engine::SecurityEngine;

/// Build the application state and router for one engine.
#[must_use]
pub fn app(engine: Arc<SecurityEngine>, config: ServerConfig) -> axum::Router {
    router(Arc::new(AppState::new(engine, config)))
}
