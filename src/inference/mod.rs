//! HTTP inference backend
//!
//! [`InferenceInvoker`] over a remote chat-completion API. The backend's
//! answer (status, headers, body) is handed back as the HTTP response, minus
//! hop-by-hop headers. An error status from the backend is a normal result;
//! only transport-level problems are [`InferenceError`]s.

use std::time::Duration;

use async_trait::async_trait;
use http_body_util::Full;
use hyper::header::HeaderName;
use hyper::Response;
use reqwest::Url;
use serde_json::Value;

use crate::config::{ApiStyle, InferenceConfig};
use crate::dispatch::{ChatRequestPayload, InferenceError, InferenceInvoker, OutgoingResponse};

/// Headers that describe the upstream connection, not the message
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub struct HttpInferenceClient {
    client: reqwest::Client,
    endpoint: String,
    style: ApiStyle,
    api_token: Option<String>,
}

impl HttpInferenceClient {
    pub fn new(config: &InferenceConfig) -> Result<Self, InferenceError> {
        Url::parse(&config.endpoint)
            .map_err(|_| InferenceError::InvalidEndpoint(config.endpoint.clone()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            style: config.api_style,
            api_token: config.api_token.clone(),
        })
    }

    fn target_url(&self, model: &str) -> Result<Url, InferenceError> {
        let raw = match self.style {
            ApiStyle::WorkersAi => format!("{}/run/{model}", self.endpoint),
            ApiStyle::OpenAi => format!("{}/chat/completions", self.endpoint),
        };
        Url::parse(&raw).map_err(|_| InferenceError::InvalidEndpoint(raw))
    }

    /// Wire body for the configured style; the configured model always wins
    fn request_body(&self, model: &str, payload: ChatRequestPayload) -> Result<Value, InferenceError> {
        match self.style {
            ApiStyle::WorkersAi => Ok(payload.into_value()),
            ApiStyle::OpenAi => match payload.into_value() {
                Value::Object(mut fields) => {
                    fields.insert("model".to_string(), Value::String(model.to_string()));
                    Ok(Value::Object(fields))
                }
                _ => Err(InferenceError::PayloadNotObject),
            },
        }
    }
}

#[async_trait]
impl InferenceInvoker for HttpInferenceClient {
    async fn invoke(
        &self,
        model: &str,
        payload: ChatRequestPayload,
    ) -> Result<OutgoingResponse, InferenceError> {
        let url = self.target_url(model)?;
        let body = self.request_body(model, payload)?;

        let mut request = self.client.post(url).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let upstream = request.send().await?;
        tracing::debug!("[Inference] {model} answered {}", upstream.status());
        into_outgoing(upstream).await
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Rebuild the upstream answer as our response
async fn into_outgoing(upstream: reqwest::Response) -> Result<OutgoingResponse, InferenceError> {
    let mut builder = Response::builder().status(upstream.status());
    for (name, value) in upstream.headers() {
        if !is_hop_by_hop(name) {
            builder = builder.header(name, value);
        }
    }

    let body = upstream.bytes().await.map_err(InferenceError::Body)?;
    Ok(builder.body(Full::new(body))?)
}
