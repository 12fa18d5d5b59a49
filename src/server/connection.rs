// Connection module
// Admission control and per-connection HTTP/1 serving

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::sync::futures::OwnedNotified;

use crate::config::AppState;
use crate::dispatch::OutgoingResponse;
use crate::handler;
use crate::http;
use crate::logger;

/// How often an open connection checks whether it has been idle too long
const IDLE_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Accept a connection, enforcing `max_connections`, and serve it in its own task.
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
) {
    // Increment first, then check, so concurrent accepts can't both slip under the limit
    let prev_count = state.active_connections.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            state.active_connections.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            drop(stream);
            return;
        }
    }

    // Registered here, not in the task, so a shutdown issued before the task
    // first runs still reaches this connection
    let shutdown = Arc::clone(&state.shutdown).notified_owned();

    logger::log_connection_accepted(&peer_addr);
    handle_connection(stream, peer_addr, Arc::clone(state), shutdown);
}

/// Request bookkeeping for the keep-alive idle limit
struct Activity {
    started: Instant,
    in_flight: AtomicUsize,
    /// Milliseconds after `started` of the last request start or finish
    last_active_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            in_flight: AtomicUsize::new(0),
            last_active_ms: AtomicU64::new(0),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn touch(&self) {
        self.last_active_ms.store(self.now_ms(), Ordering::SeqCst);
    }

    fn begin(self: &Arc<Self>) -> InFlight {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.touch();
        InFlight(Arc::clone(self))
    }

    /// Time since the last request finished; `None` while one is running
    fn idle_for(&self) -> Option<Duration> {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            return None;
        }
        let last = self.last_active_ms.load(Ordering::SeqCst);
        Some(Duration::from_millis(self.now_ms().saturating_sub(last)))
    }
}

/// Marks one request as running until dropped
struct InFlight(Arc<Activity>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.touch();
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serve one connection until it closes, goes idle, or shutdown is requested.
///
/// Limits:
/// - request head must arrive within `read_timeout`
/// - each response must be produced within `write_timeout` (504 otherwise)
/// - a kept-alive connection with no request for `keep_alive_timeout` is closed
///
/// On shutdown or idle close the in-flight request, if any, still completes.
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: OwnedNotified,
) {
    tokio::spawn(async move {
        let performance = &state.config.performance;
        let keep_alive = performance.keep_alive_timeout > 0;
        let idle_limit = Duration::from_secs(performance.keep_alive_timeout);
        let activity = Arc::new(Activity::new());

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .keep_alive(keep_alive)
            .header_read_timeout(Duration::from_secs(performance.read_timeout));

        let service_state = Arc::clone(&state);
        let service_activity = Arc::clone(&activity);
        let conn = builder.serve_connection(
            TokioIo::new(stream),
            service_fn(move |req| {
                let state = Arc::clone(&service_state);
                let activity = Arc::clone(&service_activity);
                async move {
                    let _in_flight = activity.begin();
                    serve_with_deadline(req, state, peer_addr).await
                }
            }),
        );
        tokio::pin!(conn);
        tokio::pin!(shutdown);

        let mut idle_check = tokio::time::interval(IDLE_CHECK_INTERVAL);
        let result = loop {
            tokio::select! {
                result = conn.as_mut() => break result,
                () = &mut shutdown => {
                    conn.as_mut().graceful_shutdown();
                    break conn.as_mut().await;
                }
                _ = idle_check.tick(), if keep_alive => {
                    if activity.idle_for().is_some_and(|idle| idle >= idle_limit) {
                        logger::log_connection_idle(&peer_addr, idle_limit);
                        conn.as_mut().graceful_shutdown();
                        break conn.as_mut().await;
                    }
                }
            }
        };

        if let Err(err) = result {
            logger::log_connection_error(&err);
        }

        state.active_connections.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Run the handler under the per-request `write_timeout`
async fn serve_with_deadline(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<OutgoingResponse, Infallible> {
    let deadline = Duration::from_secs(state.config.performance.write_timeout);
    let path = req.uri().path().to_string();

    match tokio::time::timeout(deadline, handler::handle_request(req, state, peer_addr)).await {
        Ok(result) => result,
        Err(_) => {
            logger::log_warning(&format!(
                "Request {path} from {peer_addr} exceeded {} seconds",
                deadline.as_secs()
            ));
            Ok(http::build_504_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dispatch::{
        AssetError, AssetResolver, ChatRequestPayload, Dispatcher, IncomingRequest,
        InferenceError, InferenceInvoker,
    };
    use crate::server::create_listener;
    use async_trait::async_trait;
    use http_body_util::{BodyExt, Full};
    use hyper::body::Bytes;
    use hyper::client::conn::http1 as client;
    use hyper::{Method, Response, StatusCode};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    struct StaticAssets;

    #[async_trait]
    impl AssetResolver for StaticAssets {
        async fn resolve(&self, _request: IncomingRequest) -> Result<OutgoingResponse, AssetError> {
            Ok(Response::new(Full::new(Bytes::from_static(b"asset"))))
        }
    }

    /// Answers after a fixed delay
    struct SlowInference(Duration);

    #[async_trait]
    impl InferenceInvoker for SlowInference {
        async fn invoke(
            &self,
            _model: &str,
            _payload: ChatRequestPayload,
        ) -> Result<OutgoingResponse, InferenceError> {
            tokio::time::sleep(self.0).await;
            Ok(Response::new(Full::new(Bytes::from_static(b"{\"response\":\"ai\"}"))))
        }
    }

    fn state(configure: impl FnOnce(&mut Config), inference_delay: Duration) -> Arc<AppState> {
        let mut config = Config::load_from("/nonexistent/edge-dispatch-config").unwrap();
        config.logging.access_log = false;
        configure(&mut config);
        let dispatcher = Dispatcher::new(
            Arc::new(StaticAssets),
            Arc::new(SlowInference(inference_delay)),
            "m",
        );
        Arc::new(AppState::new(config, dispatcher))
    }

    /// Server-side stream accepted into `state`, plus the client end
    async fn connect(state: &Arc<AppState>) -> TcpStream {
        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (stream, peer) = listener.accept().await.unwrap();
        accept_connection(stream, peer, state);
        client
    }

    fn request(method: Method, path: &str, body: &'static str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    #[tokio::test]
    async fn test_late_request_on_kept_alive_connection_is_served() {
        let state = state(
            |config| {
                config.performance.read_timeout = 2;
                config.performance.write_timeout = 2;
            },
            Duration::from_secs(1),
        );
        let stream = connect(&state).await;
        let (mut sender, conn) = client::handshake(TokioIo::new(stream)).await.unwrap();
        tokio::spawn(conn);

        let resp = sender.send_request(request(Method::GET, "/", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        resp.into_body().collect().await.unwrap();

        // Past the point where a whole-connection cap of 2s would cut the chat call
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let resp = sender
            .send_request(request(
                Method::POST,
                "/api/chat",
                r#"{"messages":[{"role":"user","content":"hi"}]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, r#"{"response":"ai"}"#);
    }

    #[tokio::test]
    async fn test_request_over_deadline_gets_504() {
        let state = state(
            |config| config.performance.write_timeout = 1,
            Duration::from_secs(5),
        );
        let stream = connect(&state).await;
        let (mut sender, conn) = client::handshake(TokioIo::new(stream)).await.unwrap();
        tokio::spawn(conn);

        let resp = sender
            .send_request(request(Method::POST, "/api/chat", r#"{"messages":[]}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_idle_kept_alive_connection_is_closed() {
        let state = state(
            |config| config.performance.keep_alive_timeout = 1,
            Duration::ZERO,
        );
        let stream = connect(&state).await;
        let (mut sender, conn) = client::handshake(TokioIo::new(stream)).await.unwrap();
        let conn = tokio::spawn(conn);

        let resp = sender.send_request(request(Method::GET, "/", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        resp.into_body().collect().await.unwrap();

        // The client connection future ends once the server closes its side
        tokio::time::timeout(Duration::from_secs(5), conn)
            .await
            .expect("idle connection should be closed by the server")
            .unwrap()
            .unwrap();

        for _ in 0..20 {
            if state.active_connections.load(Ordering::SeqCst) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(state.active_connections.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_right_after_accept_closes_connection() {
        let state = state(|_| {}, Duration::ZERO);
        let mut client = connect(&state).await;

        // The connection task has not run yet on this single-threaded runtime
        state.shutdown.notify_waiters();

        let mut raw = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut raw)).await;
        assert!(read.is_ok(), "connection should close on shutdown");
        assert!(raw.is_empty());
    }

    #[test]
    fn test_activity_tracks_in_flight_requests() {
        let activity = Arc::new(Activity::new());
        assert!(activity.idle_for().is_some());

        let in_flight = activity.begin();
        assert!(activity.idle_for().is_none());

        drop(in_flight);
        assert!(activity.idle_for().unwrap() < Duration::from_secs(1));
    }
}
