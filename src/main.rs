//! SpellQuest · Spelling Tutor Backend
//!
//! - Axum HTTP + WebSocket API (lessons, rewards, shop, reading room, classes)
//! - Versioned JSON store with change notifications over `/ws`
//! - Optional OpenAI integration (via environment variables)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                    : u16 (default 3000)
//!   DATA_DIR                : store directory (default "./data", or [storage] in TOML)
//!   OPENAI_API_KEY          : enables OpenAI integration if present
//!   OPENAI_BASE_URL         : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL       : default "gpt-4o-mini"
//!   OPENAI_STRONG_MODEL     : default "gpt-4o"
//!   OPENAI_TRANSCRIBE_MODEL : default "whisper-1"
//!   SPELLQUEST_CONFIG_PATH  : path to TOML config (storage, prompts, extra modules)
//!   LOG_LEVEL               : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT              : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod fuzzy;
mod config;
mod seeds;
mod oracle;
mod openai;
mod rewards;
mod shop;
mod store;
mod lesson;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Open the store, build the OpenAI client and the session table.
  let state = Arc::new(AppState::new().await?);

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "spellquest_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!(target: "spellquest_backend", "Shutdown signal received");
    })
    .await?;
  Ok(())
}
