//! Per-IP token-bucket rate limiting.
//!
//! Signaling clients poll aggressively (heartbeats, incoming-request and
//! ping loops), so the sustained rate is sized for a handful of concurrent
//! poll loops per address rather than for bulk transfer.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::ConnectInfo,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

/// Sustained requests per second and burst capacity for one address.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub per_second: f64,
    pub burst: f64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            per_second: 10.0,
            burst: 30.0,
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl Bucket {
    fn full(policy: RateLimitPolicy) -> Self {
        Self {
            tokens: policy.burst,
            refilled_at: Instant::now(),
        }
    }

    fn try_take(&mut self, policy: RateLimitPolicy) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.refilled_at).as_secs_f64();
        self.refilled_at = now;
        self.tokens = (self.tokens + elapsed * policy.per_second).min(policy.burst);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<IpAddr, Bucket>>>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            policy,
        }
    }

    /// Whether a request from this address is allowed right now.
    pub async fn check(&self, ip: IpAddr) -> bool {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(ip)
            .or_insert_with(|| Bucket::full(self.policy));
        bucket.try_take(self.policy)
    }

    /// Evict buckets idle for longer than `max_idle` to bound memory.
    pub async fn purge_idle(&self, max_idle: Duration) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| now.duration_since(bucket.refilled_at) < max_idle);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}

pub async fn rate_limit_middleware(
    axum::extract::State(limiter): axum::extract::State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(ip) = client_ip(&req) {
        if !limiter.check(ip).await {
            warn!(ip = %ip, "Rate limit exceeded");
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }
    }

    Ok(next.run(req).await)
}

/// Try ConnectInfo first, then X-Forwarded-For, then X-Real-IP.
fn client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    if let Some(connect_info) = req.extensions().get::<ConnectInfo<std::net::SocketAddr>>() {
        return Some(connect_info.0.ip());
    }

    if let Some(forwarded) = req.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return Some(ip);
                }
            }
        }
    }

    if let Some(real_ip) = req.headers().get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            if let Ok(ip) = value.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(per_second: f64, burst: f64) -> RateLimitPolicy {
        RateLimitPolicy { per_second, burst }
    }

    #[tokio::test]
    async fn test_burst_then_reject() {
        let limiter = RateLimiter::new(policy(10.0, 5.0));
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..5 {
            assert!(limiter.check(ip).await);
        }
        assert!(!limiter.check(ip).await);
    }

    #[tokio::test]
    async fn test_addresses_are_independent() {
        let limiter = RateLimiter::new(policy(10.0, 2.0));
        let ip1: IpAddr = "10.0.0.1".parse().unwrap();
        let ip2: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(ip1).await);
        assert!(limiter.check(ip1).await);
        assert!(!limiter.check(ip1).await);

        assert!(limiter.check(ip2).await);
    }

    #[tokio::test]
    async fn test_purge_idle() {
        let limiter = RateLimiter::new(policy(10.0, 5.0));
        let ip: IpAddr = "192.168.1.1".parse().unwrap();
        assert!(limiter.check(ip).await);

        limiter.purge_idle(Duration::ZERO).await;

        let buckets = limiter.buckets.lock().await;
        assert!(buckets.is_empty());
    }
}
