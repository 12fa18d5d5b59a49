//! Request dispatch core
//!
//! Classifies each request by path, then hands it to exactly one of two
//! collaborators: the asset store for site traffic, or the inference backend
//! for `POST /api/chat`. Routing rejects and collaborator failures are turned
//! into responses here, so [`Dispatcher::dispatch`] always yields one.
//!
//! The dispatcher keeps no per-request state. Collaborators are injected at
//! construction and shared behind `Arc`, so one instance serves any number of
//! concurrent requests.

mod api;
mod assets;
pub mod error;
pub mod route;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;

use crate::logger;

pub use error::{AssetError, DispatchError, InferenceError};
pub use route::{classify, RouteClassification, API_PREFIX, CHAT_SUBPATH};
pub use types::{ChatMessage, ChatRequestPayload, IncomingRequest, OutgoingResponse};

/// Resolves a request against stored static assets
///
/// Implementations answer missing files themselves (typically with 404).
#[async_trait]
pub trait AssetResolver: Send + Sync {
    async fn resolve(&self, request: IncomingRequest) -> Result<OutgoingResponse, AssetError>;
}

/// Runs a chat completion on a model
#[async_trait]
pub trait InferenceInvoker: Send + Sync {
    async fn invoke(
        &self,
        model: &str,
        payload: ChatRequestPayload,
    ) -> Result<OutgoingResponse, InferenceError>;
}

/// Dispatch entry point
#[derive(Clone)]
pub struct Dispatcher {
    assets: Arc<dyn AssetResolver>,
    inference: Arc<dyn InferenceInvoker>,
    model: Arc<str>,
}

impl Dispatcher {
    /// `model` is fixed configuration passed to every inference call
    pub fn new(
        assets: Arc<dyn AssetResolver>,
        inference: Arc<dyn InferenceInvoker>,
        model: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            assets,
            inference,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Produce the response for one request
    pub async fn dispatch(&self, request: IncomingRequest) -> OutgoingResponse {
        match self.try_dispatch(request).await {
            Ok(response) => response,
            Err(err) => {
                if err.is_collaborator_failure() {
                    logger::log_collaborator_failure(&err);
                } else {
                    logger::log_route_reject(&err);
                }
                err.into_response()
            }
        }
    }

    /// Like [`dispatch`](Self::dispatch) but leaves the error unmapped
    pub async fn try_dispatch(
        &self,
        request: IncomingRequest,
    ) -> Result<OutgoingResponse, DispatchError> {
        if let RouteClassification::Api { subpath } = classify(request.uri().path()) {
            return api::dispatch_api(self.inference.as_ref(), &self.model, subpath, &request)
                .await;
        }
        assets::dispatch_asset(self.assets.as_ref(), request).await
    }
}
