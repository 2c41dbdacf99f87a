use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{app::ServiceError, http::env_or};

const RATE_LIMITED_MESSAGE: &str = "Too many requests, please try again later.";

static RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
static RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
static RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

struct Window {
    started: Instant,
    hits: AtomicU32,
}

/// Fixed-window request counter per client address. A window opens on the first
/// request of a client and its entry expires with it.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: moka::sync::Cache<IpAddr, Arc<Window>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_secs: u64,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let windows = moka::sync::Cache::builder()
            .max_capacity(100_000)
            .time_to_live(window)
            .build();
        Self {
            max_requests,
            window,
            windows,
        }
    }

    pub fn from_env() -> Self {
        let max_requests = env_or("RATE_LIMIT_MAX_REQUESTS", 100);
        let window_secs = env_or("RATE_LIMIT_WINDOW_SECS", 15 * 60);
        Self::new(max_requests, Duration::from_secs(window_secs))
    }

    pub fn hit(&self, client: IpAddr) -> RateLimitDecision {
        let window = self.windows.get_with(client, || {
            Arc::new(Window {
                started: Instant::now(),
                hits: AtomicU32::new(0),
            })
        });
        let hits = window.hits.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        let reset = self.window.saturating_sub(window.started.elapsed());

        RateLimitDecision {
            allowed: hits <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(hits),
            reset_secs: reset.as_secs_f64().ceil() as u64,
        }
    }
}

impl RateLimitDecision {
    fn write_headers(&self, headers: &mut HeaderMap) {
        headers.insert(RATE_LIMIT_LIMIT.clone(), HeaderValue::from(self.limit));
        headers.insert(RATE_LIMIT_REMAINING.clone(), HeaderValue::from(self.remaining));
        headers.insert(RATE_LIMIT_RESET.clone(), HeaderValue::from(self.reset_secs));
    }
}

pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    let decision = limiter.hit(client);
    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        log::debug!("Rate limit exceeded for {}", client);
        ServiceError::TooManyRequests(RATE_LIMITED_MESSAGE.to_string()).into_response()
    };
    decision.write_headers(response.headers_mut());
    response
}
