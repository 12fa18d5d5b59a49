//! Edge request dispatcher.
//!
//! Requests under `/api/` are API calls (`POST /api/chat` goes to the
//! inference backend); everything else is served from static assets. The
//! routing core lives in [`dispatch`]; [`assets`] and [`inference`] are the
//! production collaborators and [`server`] hosts it all over HTTP/1.

pub mod assets;
pub mod config;
pub mod dispatch;
pub mod handler;
pub mod http;
pub mod inference;
pub mod logger;
pub mod server;
