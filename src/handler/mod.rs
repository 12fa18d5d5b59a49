//! Request handler module
//!
//! Glue between hyper's streaming requests and the dispatcher: body limits,
//! body collection, `Server` header and access logging.

pub mod service;

// Re-export main entry point
pub use service::handle_request;
