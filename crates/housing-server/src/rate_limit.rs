//! Per-client request throttling.
//!
//! Registration submissions draw from their own, much smaller allowance than
//! the rest of the API: the vault only holds fifty applications, and every
//! new national ID past that evicts someone else's.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::ServerConfig;
use crate::error::ServerError;

/// Which allowance a request draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Registration,
    General,
}

impl Scope {
    pub fn of(method: &Method, path: &str) -> Self {
        if *method == Method::POST && path == "/applications" {
            Scope::Registration
        } else {
            Scope::General
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quota {
    pub per_sec: f64,
    pub burst: f64,
}

impl Quota {
    pub fn per_minute(per_min: f64, burst: f64) -> Self {
        Self {
            per_sec: per_min / 60.0,
            burst,
        }
    }

    pub fn per_second(per_sec: f64, burst: f64) -> Self {
        Self { per_sec, burst }
    }
}

#[derive(Debug, Clone)]
struct Allowance {
    tokens: f64,
    refreshed: Instant,
}

impl Allowance {
    fn full(quota: Quota, now: Instant) -> Self {
        Self {
            tokens: quota.burst,
            refreshed: now,
        }
    }

    fn take(&mut self, quota: Quota, now: Instant) -> bool {
        let earned = now.saturating_duration_since(self.refreshed).as_secs_f64() * quota.per_sec;
        self.tokens = (self.tokens + earned).min(quota.burst);
        self.refreshed = now;

        if self.tokens < 1.0 {
            return false;
        }
        self.tokens -= 1.0;
        true
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    allowances: Arc<Mutex<HashMap<(IpAddr, Scope), Allowance>>>,
    registration: Quota,
    general: Quota,
    trust_proxy_headers: bool,
}

impl RateLimiter {
    pub fn new(registration: Quota, general: Quota) -> Self {
        Self {
            allowances: Arc::new(Mutex::new(HashMap::new())),
            registration,
            general,
            trust_proxy_headers: false,
        }
    }

    pub fn trusting_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            Quota::per_minute(config.registration_rate_per_min, config.registration_burst),
            Quota::per_second(config.rate_limit_per_sec, config.rate_limit_burst),
        )
        .trusting_proxy_headers(config.trust_proxy_headers)
    }

    fn quota(&self, scope: Scope) -> Quota {
        match scope {
            Scope::Registration => self.registration,
            Scope::General => self.general,
        }
    }

    pub async fn check(&self, ip: IpAddr, scope: Scope) -> bool {
        self.check_at(ip, scope, Instant::now()).await
    }

    async fn check_at(&self, ip: IpAddr, scope: Scope, now: Instant) -> bool {
        let quota = self.quota(scope);
        let mut allowances = self.allowances.lock().await;
        allowances
            .entry((ip, scope))
            .or_insert_with(|| Allowance::full(quota, now))
            .take(quota, now)
    }

    /// Forget clients idle for longer than `max_idle`. Returns how many
    /// allowances were dropped.
    pub async fn purge_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut allowances = self.allowances.lock().await;
        let before = allowances.len();
        allowances.retain(|_, a| now.saturating_duration_since(a.refreshed) < max_idle);
        before - allowances.len()
    }

    /// The socket peer, or the first forwarded address when proxy headers
    /// are trusted.
    fn client_ip<B>(&self, req: &Request<B>) -> Option<IpAddr> {
        if self.trust_proxy_headers {
            let forwarded = ["x-forwarded-for", "x-real-ip"].into_iter().find_map(|name| {
                req.headers()
                    .get(name)?
                    .to_str()
                    .ok()?
                    .split(',')
                    .next()?
                    .trim()
                    .parse::<IpAddr>()
                    .ok()
            });
            if forwarded.is_some() {
                return forwarded;
            }
        }

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let scope = Scope::of(req.method(), req.uri().path());

    if let Some(ip) = limiter.client_ip(&req) {
        if !limiter.check(ip, scope).await {
            warn!(ip = %ip, ?scope, path = %req.uri().path(), "Rate limit exceeded");
            return Err(ServerError::RateLimited);
        }
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Quota::per_minute(6.0, 2.0), Quota::per_second(10.0, 5.0))
    }

    #[test]
    fn test_scope_of_request() {
        assert_eq!(Scope::of(&Method::POST, "/applications"), Scope::Registration);
        assert_eq!(Scope::of(&Method::GET, "/applications"), Scope::General);
        assert_eq!(Scope::of(&Method::POST, "/admin/cleanup"), Scope::General);
    }

    #[tokio::test]
    async fn test_registration_allowance_is_tighter() {
        let limiter = limiter();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        assert!(limiter.check(ip, Scope::Registration).await);
        assert!(limiter.check(ip, Scope::Registration).await);
        assert!(!limiter.check(ip, Scope::Registration).await);

        // admin and lookup traffic is unaffected
        for _ in 0..5 {
            assert!(limiter.check(ip, Scope::General).await);
        }
        assert!(!limiter.check(ip, Scope::General).await);

        let other: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(limiter.check(other, Scope::Registration).await);
    }

    #[tokio::test]
    async fn test_registration_allowance_refills_per_minute() {
        let limiter = limiter();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let start = Instant::now();

        assert!(limiter.check_at(ip, Scope::Registration, start).await);
        assert!(limiter.check_at(ip, Scope::Registration, start).await);
        assert!(!limiter.check_at(ip, Scope::Registration, start).await);

        // 6 per minute: one more after ten seconds, not before
        let soon = start + Duration::from_secs(5);
        assert!(!limiter.check_at(ip, Scope::Registration, soon).await);
        let later = soon + Duration::from_secs(6);
        assert!(limiter.check_at(ip, Scope::Registration, later).await);
    }

    #[tokio::test]
    async fn test_purge_idle() {
        let limiter = limiter();
        let ip: IpAddr = "192.168.1.1".parse().unwrap();
        assert!(limiter.check(ip, Scope::Registration).await);
        assert!(limiter.check(ip, Scope::General).await);

        assert_eq!(limiter.purge_idle(Duration::from_secs(600)).await, 0);
        assert_eq!(limiter.purge_idle(Duration::ZERO).await, 2);
    }

    #[test]
    fn test_client_ip_ignores_headers_unless_trusted() {
        let peer: SocketAddr = "198.51.100.9:40000".parse().unwrap();
        let request = || {
            let mut req = http::Request::builder()
                .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
                .body(())
                .unwrap();
            req.extensions_mut().insert(ConnectInfo(peer));
            req
        };

        assert_eq!(limiter().client_ip(&request()), Some(peer.ip()));

        let trusting = limiter().trusting_proxy_headers(true);
        assert_eq!(trusting.client_ip(&request()), "203.0.113.7".parse().ok());

        let req = http::Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(())
            .unwrap();
        assert_eq!(trusting.client_ip(&req), "198.51.100.2".parse().ok());

        let req = http::Request::builder().body(()).unwrap();
        assert_eq!(trusting.client_ip(&req), None);
    }
}
