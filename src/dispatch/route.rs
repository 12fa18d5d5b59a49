//! Path-prefix route classification

/// Reserved prefix for API routes
pub const API_PREFIX: &str = "/api/";

/// The only API subpath with a handler
pub const CHAT_SUBPATH: &str = "chat";

/// Which dispatcher branch handles a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClassification<'a> {
    /// Path under `/api/`; carries the remainder after the prefix
    Api { subpath: &'a str },
    /// Anything else
    Asset,
}

impl RouteClassification<'_> {
    /// Short label used in access logs
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Api { .. } => "api",
            Self::Asset => "asset",
        }
    }
}

/// Classify a request path. Pure and infallible.
pub fn classify(path: &str) -> RouteClassification<'_> {
    match path.strip_prefix(API_PREFIX) {
        Some(subpath) => RouteClassification::Api { subpath },
        None => RouteClassification::Asset,
    }
}
