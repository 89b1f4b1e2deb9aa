//! Rate limiting (§1 "Out of scope: per-route rate limiting ... lives at
//! the ingress and is outside the core, mentioned for completeness" —
//! §6 "Rate limiting and API-key auth remain explicitly out of scope").
//!
//! This module defines the seam a real ingress-side limiter would plug
//! into rather than skipping it outright: [`RateLimiter`] is the trait
//! [`crate::state::AppState`] holds, and [`NoopRateLimiter`] is the only
//! implementation this crate ships, grounded on
//! `dashflow-registry::api::state::RateLimiterState`'s shape (per-client
//! counter, fixed window, `Allowed`/`Limited` outcome) without wiring in
//! its enforcement, since that enforcement is this gateway's explicit
//! Non-goal.

use async_trait::async_trait;

/// Outcome of a rate-limit check for one client id (§9 "Rate limiting
/// (external boundary)"): a leaky-bucket per client key, by tier, is the
/// shape a real ingress limiter would report through this trait.
pub enum RateLimitOutcome {
    Allowed { remaining: u32, limit: u32 },
    Limited { retry_after_secs: u32, limit: u32 },
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, client_id: &str, tier: Option<&str>) -> RateLimitOutcome;
}

/// Always allows. The only implementation this crate ships: per §1/§6,
/// per-route rate limiting is an external-ingress concern this gateway
/// does not implement, so `RATE_LIMIT_RPM_DEFAULT`/`RATE_LIMIT_RPM_<TIER>`
/// are parsed (§4.0.2) and threaded through for whatever ingress layer
/// reads them, but never enforced here.
pub struct NoopRateLimiter {
    default_rpm: u32,
}

impl NoopRateLimiter {
    pub fn new(default_rpm: u32) -> Self {
        Self { default_rpm }
    }
}

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn check(&self, _client_id: &str, _tier: Option<&str>) -> RateLimitOutcome {
        RateLimitOutcome::Allowed { remaining: self.default_rpm, limit: self.default_rpm }
    }
}
