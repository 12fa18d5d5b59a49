// Server module
// Listener setup, accept loop, connection serving and signal-driven shutdown

pub mod connection;
pub mod listener;
pub mod signal;

// `loop` is a keyword, so the file is mounted under another name
#[path = "loop.rs"]
pub mod server_loop;

use std::sync::Arc;

use anyhow::Context;

use crate::config::{AppState, Config};
use crate::logger;

pub use listener::create_listener;
pub use server_loop::start_server_loop;

/// Wire collaborators from `config`, bind, and serve until SIGINT/SIGTERM.
///
/// # Errors
///
/// Fails if the address is invalid, the listener cannot be bound, or the
/// inference client cannot be built.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = config.get_socket_addr().map_err(anyhow::Error::msg)?;
    let state = Arc::new(AppState::from_config(config).context("failed to build inference client")?);
    let listener = create_listener(addr).with_context(|| format!("failed to bind {addr}"))?;

    logger::log_server_start(&addr, &state.config);
    signal::start_signal_handler(Arc::clone(&state.shutdown));
    start_server_loop(listener, state).await;
    Ok(())
}
