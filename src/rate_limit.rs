//! Fixed-window request limiter keyed by client IP.

use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use tracing::warn;

use crate::{config::RateLimitConfig, error::AppError, state::AppState};

struct Window {
    started: Instant,
    hits: u32,
}

#[derive(Default)]
struct Buckets {
    // `None` is the shared bucket for peers without a known address.
    windows: HashMap<Option<IpAddr>, Window>,
    last_sweep: Option<Instant>,
}

#[derive(Clone)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    buckets: Arc<Mutex<Buckets>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: config.window,
            buckets: Arc::default(),
        }
    }

    /// Count one request; `false` once the client is over budget for this window.
    pub fn check(&self, client: Option<IpAddr>) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: Option<IpAddr>, now: Instant) -> bool {
        let mut buckets = self.buckets.lock();
        let due = buckets
            .last_sweep
            .map_or(true, |at| now.saturating_duration_since(at) >= self.window);
        if due {
            let window = self.window;
            buckets
                .windows
                .retain(|_, w| now.saturating_duration_since(w.started) < window);
            buckets.last_sweep = Some(now);
        }

        let window = buckets.windows.entry(client).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now.saturating_duration_since(window.started) >= self.window {
            *window = Window {
                started: now,
                hits: 0,
            };
        }
        if window.hits >= self.max_requests {
            return false;
        }
        window.hits += 1;
        true
    }
}

pub async fn limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    if !state.limiter.check(client) {
        warn!(client = ?client, "rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    Ok(next.run(req).await)
}
