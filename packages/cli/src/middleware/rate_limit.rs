// ABOUTME: Per-IP request rate limiting
// ABOUTME: Single-node in-memory counters; a distributed store is the production seam

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Type alias for a rate limiter
type RateLimiterType = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Type alias for a rate limiter instance
type RateLimiterInstance = Arc<RateLimiterType>;

/// Type alias for the rate limiter storage
type RateLimiterStorage = Arc<Mutex<HashMap<String, RateLimiterInstance>>>;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
            burst_size: 5,
        }
    }
}

/// Per-client-IP rate limiter
#[derive(Clone)]
pub struct RateLimitLayer {
    config: RateLimitConfig,
    limiters: RateLimiterStorage,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            limiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn limiter_for(&self, ip: &str) -> RateLimiterInstance {
        let mut limiters = match self.limiters.lock() {
            Ok(limiters) => limiters,
            Err(poisoned) => poisoned.into_inner(),
        };

        limiters
            .entry(ip.to_string())
            .or_insert_with(|| {
                let rpm =
                    NonZeroU32::new(self.config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
                let burst = NonZeroU32::new(self.config.burst_size).unwrap_or(NonZeroU32::MIN);
                Arc::new(RateLimiter::direct(
                    Quota::per_minute(rpm).allow_burst(burst),
                ))
            })
            .clone()
    }

    /// Whether a request from `ip` is within its budget
    pub fn check(&self, ip: &str) -> bool {
        self.limiter_for(ip).check().is_ok()
    }
}

fn client_ip(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        return forwarded.trim().to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware entry: reject with 429 once a client exhausts its budget
pub async fn enforce(
    State(layer): State<RateLimitLayer>,
    request: Request,
    next: Next,
) -> Response {
    if !layer.config.enabled {
        return next.run(request).await;
    }

    let ip = client_ip(&request);
    if !layer.check(&ip) {
        warn!("Rate limit exceeded for {}", ip);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": "Too many requests. Please try again later."})),
        )
            .into_response();
    }

    next.run(request).await
}
