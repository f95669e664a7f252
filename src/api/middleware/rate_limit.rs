//! Per-client token-bucket admission control.
//!
//! Each client (proxy-reported or peer IP) gets a bucket holding up to
//! `burst` tokens, refilled at `rps` tokens per second. A request spends one
//! token or is rejected with 429. The table lives behind one short-held mutex;
//! a sweeper task evicts clients that have gone quiet.

use crate::api::errors::ApiError;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_RPS: f64 = 10.0;
pub const DEFAULT_BURST: u32 = 20;
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const IDLE_EVICTION: Duration = Duration::from_secs(3 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

#[derive(Clone, Copy, Debug)]
pub struct LimiterConfig {
    rps: f64,
    burst: u32,
    enabled: bool,
}

impl LimiterConfig {
    /// 10 requests per second sustained, bursts of 20, enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rps: DEFAULT_RPS,
            burst: DEFAULT_BURST,
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_rps(mut self, rps: f64) -> Self {
        self.rps = rps;
        self
    }

    #[must_use]
    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn rps(&self) -> f64 {
        self.rps
    }

    #[must_use]
    pub fn burst(&self) -> u32 {
        self.burst
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    config: LimiterConfig,
    clients: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    pub fn check(&self, client: &str) -> RateLimitDecision {
        self.check_at(client, Instant::now())
    }

    /// Admission decision for `client` at instant `now`.
    pub fn check_at(&self, client: &str, now: Instant) -> RateLimitDecision {
        if !self.config.enabled {
            return RateLimitDecision::Allowed;
        }

        let capacity = f64::from(self.config.burst);
        let mut clients = self.clients.lock();
        let bucket = clients.entry(client.to_string()).or_insert(Bucket {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.config.rps).min(capacity);
        bucket.last_refill = now;
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateLimitDecision::Allowed
        } else {
            RateLimitDecision::Limited
        }
    }

    /// Drop clients not seen within `idle` of `now`. Returns how many were removed.
    pub fn sweep_at(&self, now: Instant, idle: Duration) -> usize {
        let mut clients = self.clients.lock();
        let before = clients.len();
        clients.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) <= idle);
        before - clients.len()
    }

    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().len()
    }

    /// Evict idle clients every `interval` until the returned handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, idle: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.sweep_at(Instant::now(), idle);
                if removed > 0 {
                    debug!(removed, "evicted idle rate limiter clients");
                }
            }
        })
    }
}

/// Identify the client: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer.
#[must_use]
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(forwarded) = forwarded {
        return Some(forwarded.to_string());
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(real_ip) = real_ip {
        return Some(real_ip.to_string());
    }

    peer.map(|addr| addr.ip().to_string())
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !limiter.config().enabled() {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let Some(client) = client_key(request.headers(), peer) else {
        warn!("could not determine client address for rate limiting");
        return ApiError::internal(anyhow::anyhow!("client address unavailable"))
            .into_response();
    };

    match limiter.check(&client) {
        RateLimitDecision::Allowed => next.run(request).await,
        RateLimitDecision::Limited => {
            debug!(client = %client, "rate limit exceeded");
            ApiError::RateLimited.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn limiter(rps: f64, burst: u32) -> RateLimiter {
        RateLimiter::new(LimiterConfig::new().with_rps(rps).with_burst(burst))
    }

    #[test]
    fn burst_then_reject_then_refill() {
        let limiter = limiter(2.0, 4);
        let start = Instant::now();

        for _ in 0..4 {
            assert_eq!(limiter.check_at("1.2.3.4", start), RateLimitDecision::Allowed);
        }
        assert_eq!(limiter.check_at("1.2.3.4", start), RateLimitDecision::Limited);

        // 1/rps later exactly one more request fits.
        let later = start + Duration::from_millis(500);
        assert_eq!(limiter.check_at("1.2.3.4", later), RateLimitDecision::Allowed);
        assert_eq!(limiter.check_at("1.2.3.4", later), RateLimitDecision::Limited);
    }

    #[test]
    fn refill_is_capped_at_burst() {
        let limiter = limiter(100.0, 3);
        let start = Instant::now();
        assert_eq!(limiter.check_at("c", start), RateLimitDecision::Allowed);

        let much_later = start + Duration::from_secs(3600);
        for _ in 0..3 {
            assert_eq!(limiter.check_at("c", much_later), RateLimitDecision::Allowed);
        }
        assert_eq!(limiter.check_at("c", much_later), RateLimitDecision::Limited);
    }

    #[test]
    fn clients_are_independent() {
        let limiter = limiter(1.0, 1);
        let now = Instant::now();
        assert_eq!(limiter.check_at("a", now), RateLimitDecision::Allowed);
        assert_eq!(limiter.check_at("a", now), RateLimitDecision::Limited);
        assert_eq!(limiter.check_at("b", now), RateLimitDecision::Allowed);
    }

    #[test]
    fn disabled_limiter_admits_everything() {
        let limiter = RateLimiter::new(LimiterConfig::new().with_burst(1).with_enabled(false));
        let now = Instant::now();
        for _ in 0..10 {
            assert_eq!(limiter.check_at("a", now), RateLimitDecision::Allowed);
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn sweep_evicts_idle_clients() {
        let limiter = limiter(1.0, 5);
        let start = Instant::now();
        limiter.check_at("quiet", start);
        limiter.check_at("busy", start + Duration::from_secs(170));

        let removed = limiter.sweep_at(start + Duration::from_secs(181), IDLE_EVICTION);
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn client_key_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_key(&headers, None), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn client_key_falls_back_to_real_ip_then_peer() {
        let peer: SocketAddr = ([10, 0, 0, 1], 4000).into();

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_key(&headers, Some(peer)), Some("9.9.9.9".to_string()));

        let headers = HeaderMap::new();
        assert_eq!(client_key(&headers, Some(peer)), Some("10.0.0.1".to_string()));
        assert_eq!(client_key(&headers, None), None);
    }
}
