//! Per-request entry point called by the connection service

use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, CONTENT_LENGTH, REFERER, SERVER, USER_AGENT};
use hyper::{HeaderMap, Request, Version};

use crate::config::AppState;
use crate::dispatch::{classify, IncomingRequest, OutgoingResponse};
use crate::http;
use crate::logger::{self, AccessLogEntry};

/// Handle one request end to end. Never fails; every outcome is a response.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<OutgoingResponse, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let started = Instant::now();
    let logging = &state.config.logging;
    let entry = logging
        .access_log
        .then(|| access_entry(&req, peer_addr));

    let mut response = match read_request(req, state.config.http.max_body_size).await {
        Ok(request) => state.dispatcher.dispatch(request).await,
        Err(rejection) => rejection,
    };

    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().entry(SERVER).or_insert(server);
    }

    if let Some(mut entry) = entry {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &logging.access_log_format);
    }

    Ok(response)
}

/// Collect the body under the size limit
async fn read_request<B>(req: Request<B>, max_body_size: u64) -> Result<IncomingRequest, OutgoingResponse>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    if let Some(rejection) = check_body_size(req.headers(), max_body_size) {
        return Err(rejection);
    }

    let (parts, body) = req.into_parts();
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);

    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(Request::from_parts(parts, collected.to_bytes())),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_warning(&format!(
                "Request body exceeded {max_body_size} bytes while streaming"
            ));
            Err(http::build_413_response())
        }
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            Err(http::build_400_response())
        }
    }
}

/// Reject early when the declared Content-Length is over the limit
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Option<OutgoingResponse> {
    let declared = headers.get(CONTENT_LENGTH)?;
    match declared.to_str().ok().and_then(|v| v.parse::<u64>().ok()) {
        Some(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Some(http::build_413_response())
        }
        Some(_) => None,
        None => {
            logger::log_warning("Invalid Content-Length header, relying on streaming limit");
            None
        }
    }
}

fn access_entry<B>(req: &Request<B>, peer_addr: SocketAddr) -> AccessLogEntry {
    let uri = req.uri();
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        uri.path().to_string(),
    );
    entry.query = uri.query().map(str::to_string);
    entry.http_version = version_label(req.version()).to_string();
    entry.referer = header_string(req.headers(), REFERER);
    entry.user_agent = header_string(req.headers(), USER_AGENT);
    entry.route = classify(uri.path()).label();
    entry
}

fn header_string(headers: &HeaderMap, name: hyper::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

const fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dispatch::{
        AssetError, AssetResolver, ChatRequestPayload, Dispatcher, InferenceError,
        InferenceInvoker,
    };
    use async_trait::async_trait;
    use http_body_util::Full;
    use hyper::{Method, Response, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct EchoAssets;

    #[async_trait]
    impl AssetResolver for EchoAssets {
        async fn resolve(&self, request: IncomingRequest) -> Result<OutgoingResponse, AssetError> {
            Ok(Response::new(Full::new(request.body().clone())))
        }
    }

    #[derive(Default)]
    struct CountingInference {
        calls: AtomicUsize,
        last: Mutex<Option<ChatRequestPayload>>,
    }

    #[async_trait]
    impl InferenceInvoker for CountingInference {
        async fn invoke(
            &self,
            _model: &str,
            payload: ChatRequestPayload,
        ) -> Result<OutgoingResponse, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(payload);
            Ok(Response::builder()
                .header("server", "upstream")
                .body(Full::new(Bytes::from_static(b"ai")))
                .unwrap())
        }
    }

    fn state(max_body_size: u64) -> (Arc<AppState>, Arc<CountingInference>) {
        let mut config = Config::load_from("/nonexistent/edge-dispatch-config").unwrap();
        config.http.max_body_size = max_body_size;
        config.http.server_name = "edge-test".to_string();
        config.logging.access_log = true;

        let inference = Arc::new(CountingInference::default());
        let dispatcher = Dispatcher::new(Arc::new(EchoAssets), inference.clone(), "model");
        (Arc::new(AppState::new(config, dispatcher)), inference)
    }

    fn peer() -> SocketAddr {
        "203.0.113.9:50000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_declared_oversize_body_is_rejected_before_dispatch() {
        let (state, inference) = state(16);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/chat")
            .header("content-length", "1000")
            .body(Full::new(Bytes::from(vec![b'x'; 1000])))
            .unwrap();

        let resp = handle_request(req, state, peer()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(inference.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_streamed_oversize_body_is_rejected() {
        let (state, inference) = state(16);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/chat")
            .body(Full::new(Bytes::from(vec![b'x'; 64])))
            .unwrap();

        let resp = handle_request(req, state, peer()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(inference.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chat_body_reaches_inference() {
        let (state, inference) = state(1024);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/chat")
            .body(Full::new(Bytes::from_static(
                br#"{"messages":[{"role":"user","content":"hi"}]}"#,
            )))
            .unwrap();

        let resp = handle_request(req, state, peer()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        // upstream's own Server header is kept
        assert_eq!(resp.headers()["server"], "upstream");
        assert_eq!(inference.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            inference.last.lock().unwrap().as_ref().and_then(ChatRequestPayload::message_count),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_asset_request_gets_server_header() {
        let (state, _inference) = state(1024);
        let req = Request::builder()
            .uri("/index.html")
            .body(Full::new(Bytes::from_static(b"echo")))
            .unwrap();

        let resp = handle_request(req, state, peer()).await.unwrap();
        assert_eq!(resp.headers()["server"], "edge-test");
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "echo");
    }

    #[test]
    fn test_access_entry_fields() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/chat?debug=1")
            .header("user-agent", "curl/8.0")
            .body(())
            .unwrap();

        let entry = access_entry(&req, peer());
        assert_eq!(entry.remote_addr, "203.0.113.9");
        assert_eq!(entry.path, "/api/chat");
        assert_eq!(entry.query.as_deref(), Some("debug=1"));
        assert_eq!(entry.user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(entry.route, "api");
        assert_eq!(entry.http_version, "1.1");
    }
}
