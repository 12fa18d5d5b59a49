//! Logger module
//!
//! Thin facade over `tracing` so call sites read as one-liners:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Dispatch outcome logging (routing rejects vs collaborator failures)

mod format;
pub mod writer;

pub use format::AccessLogEntry;
pub use writer::{init, LogGuard};

use std::error::Error;
use std::net::SocketAddr;

use crate::config::Config;
use crate::dispatch::DispatchError;

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!("======================================");
    tracing::info!("Edge dispatcher started");
    tracing::info!("Listening on: http://{addr}");
    tracing::info!("Assets: {}", config.assets.directory);
    tracing::info!(
        "Inference: {} ({}, model {})",
        config.inference.endpoint,
        config.inference.api_style,
        config.inference.model
    );
    if let Some(workers) = config.server.workers {
        tracing::info!("Worker threads: {workers}");
    }
    if let Some(ref dir) = config.logging.log_dir {
        tracing::info!("Log directory: {dir}");
    }
    tracing::info!("======================================");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    tracing::debug!("[Connection] Accepted from: {peer_addr}");
}

pub fn log_connection_idle(peer_addr: &SocketAddr, idle_limit: std::time::Duration) {
    tracing::debug!(
        "[Connection] Closing {peer_addr} after {}s without a request",
        idle_limit.as_secs()
    );
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("[Connection] Failed to serve connection: {err:?}");
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

pub fn log_chat_invocation(model: &str, message_count: Option<usize>) {
    match message_count {
        Some(count) => tracing::debug!("[Chat] Invoking {model} with {count} message(s)"),
        None => tracing::debug!("[Chat] Invoking {model} with unrecognized messages field"),
    }
}

/// Expected rejects inside the API namespace; not errors
pub fn log_route_reject(err: &DispatchError) {
    tracing::debug!(status = err.status().as_u16(), "[Route] {err}");
}

/// Collaborator failure with its full cause chain; the client never sees this text
pub fn log_collaborator_failure(err: &DispatchError) {
    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    tracing::error!(status = err.status().as_u16(), "[Dispatch] {detail}");
}

/// Emit a formatted access log line on the `access` target
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: "access", "{}", entry.format(format));
}

pub fn log_shutdown_requested(signal: &str) {
    tracing::info!("[Shutdown] {signal} received, no longer accepting connections");
}

pub fn log_shutdown_complete(remaining: usize) {
    if remaining == 0 {
        tracing::info!("[Shutdown] All connections drained");
    } else {
        tracing::warn!("[Shutdown] Grace period elapsed with {remaining} connection(s) still open");
    }
}
