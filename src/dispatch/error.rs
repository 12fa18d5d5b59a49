//! Dispatch error taxonomy and its mapping to HTTP responses

use std::io;
use std::path::PathBuf;

use hyper::{Method, StatusCode};
use thiserror::Error;

use super::types::OutgoingResponse;
use crate::http;

/// Failure raised by an asset store
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset root '{}' is not accessible", root.display())]
    RootUnavailable {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read asset '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure raised by an inference backend
///
/// A non-2xx answer from the backend is a valid result, not one of these.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("invalid inference endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("inference payload must be a JSON object to carry a model field")]
    PayloadNotObject,

    #[error("inference request failed")]
    Transport(#[from] reqwest::Error),

    #[error("failed to read inference response body")]
    Body(#[source] reqwest::Error),

    #[error("failed to rebuild inference response")]
    Response(#[from] hyper::http::Error),
}

/// Why a request did not produce a collaborator response
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Unknown subpath under the API prefix
    #[error("no API route for '{path}'")]
    RouteNotFound { path: String },

    /// Chat route hit with something other than POST
    #[error("method {method} not allowed on chat route")]
    MethodNotAllowed { method: Method },

    /// Chat body is not JSON at all
    #[error("chat request body is not valid JSON")]
    MalformedPayload(#[source] serde_json::Error),

    #[error("asset collaborator failed")]
    Asset(#[from] AssetError),

    #[error("inference collaborator failed")]
    Inference(#[from] InferenceError),
}

impl DispatchError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Self::Asset(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Inference(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// True when a collaborator was called and failed, as opposed to a routing reject
    pub const fn is_collaborator_failure(&self) -> bool {
        matches!(self, Self::Asset(_) | Self::Inference(_))
    }

    /// Convert into the caller-facing response. Bodies are fixed strings.
    pub fn into_response(self) -> OutgoingResponse {
        match self {
            Self::RouteNotFound { .. } => http::build_404_response(),
            Self::MethodNotAllowed { .. } => http::build_405_response("POST"),
            Self::MalformedPayload(_) => http::build_400_response(),
            Self::Asset(_) => http::build_500_response(),
            Self::Inference(_) => http::build_502_response(),
        }
    }
}
