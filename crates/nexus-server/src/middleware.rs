// SPDX-License-Identifier: MIT OR Apache-2.0
//! Middleware stack for the Dev-Nexus HTTP API.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RequestId middleware
// ---------------------------------------------------------------------------

/// A unique request identifier, available as an Axum extension and used as
/// the correlation id in internal-error payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub Uuid);

/// Axum middleware that generates a [`RequestId`] for each request and sets
/// the `X-Request-Id` response header.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = RequestId(Uuid::new_v4());
    req.extensions_mut().insert(id);
    let mut resp = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id.0.to_string()) {
        resp.headers_mut().insert("x-request-id", value);
    }
    resp
}

// ---------------------------------------------------------------------------
// RequestLogger
// ---------------------------------------------------------------------------

/// Axum middleware that logs method, path, status code, and duration for
/// each request using [`tracing`] structured fields.
pub struct RequestLogger;

impl RequestLogger {
    /// Axum-compatible handler function.
    pub async fn layer(req: Request, next: Next) -> Response {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let start = Instant::now();

        let resp = next.run(req).await;

        let duration = start.elapsed();
        let status = resp.status().as_u16();

        info!(
            http.method = %method,
            http.path = %path,
            http.status = status,
            http.duration_ms = duration.as_millis() as u64,
            "request completed"
        );

        resp
    }
}

// ---------------------------------------------------------------------------
// ConcurrencyLimiter
// ---------------------------------------------------------------------------

/// Sheds load once the configured number of requests is in flight.
///
/// Saturation yields 503 with the standard failure envelope; nothing
/// queues.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimiter {
    /// Allow up to `max_in_flight` concurrent requests.
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_in_flight)),
        }
    }

    /// Create a Tower [`Layer`](tower::Layer) from this limiter.
    pub fn into_layer(self) -> ConcurrencyLimiterLayer {
        ConcurrencyLimiterLayer(self)
    }
}

/// Tower [`Layer`] that wraps services with [`ConcurrencyLimiter`]
/// enforcement.
#[derive(Clone)]
pub struct ConcurrencyLimiterLayer(ConcurrencyLimiter);

impl<S: Clone> tower::Layer<S> for ConcurrencyLimiterLayer {
    type Service = ConcurrencyLimiterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ConcurrencyLimiterService {
            limiter: self.0.clone(),
            inner,
        }
    }
}

/// Tower [`Service`] that acquires an in-flight permit before forwarding to
/// the inner service.
#[derive(Clone)]
pub struct ConcurrencyLimiterService<S> {
    limiter: ConcurrencyLimiter,
    inner: S,
}

impl<S> tower::Service<Request<Body>> for ConcurrencyLimiterService<S>
where
    S: tower::Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: IntoResponse,
{
    type Response = Response;
    type Error = S::Error;
    type Future =
        std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let mut inner = self.inner.clone();
        Box::pin(async move {
            let Ok(_permit) = limiter.semaphore.clone().try_acquire_owned() else {
                let body = Json(json!({
                    "success": false,
                    "error": "server is at capacity",
                    "retryable": true,
                }));
                return Ok((StatusCode::SERVICE_UNAVAILABLE, body).into_response());
            };
            inner.call(req).await
        })
    }
}

// ---------------------------------------------------------------------------
// CORS
// ---------------------------------------------------------------------------

/// Build the CORS layer from the configured origin whitelist.
///
/// No configured origins means permissive.
pub fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    match origins {
        None => CorsLayer::permissive(),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok())
                .collect();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins))
        }
    }
}
