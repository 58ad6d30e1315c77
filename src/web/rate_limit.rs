//! Fixed-window request counter keyed by client identifier.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use actix_web::http::header::HeaderMap;

use crate::config::RateLimitConfig;

/// Bucket shared by every client that sends neither proxy header nor has a
/// known peer address.
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at: Instant,
}

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: config.window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request from `client_id` and report whether it is allowed.
    ///
    /// Denied requests still increment the counter; the window only resets
    /// once `now` is past the entry's reset time.
    pub fn check_and_consume(&self, client_id: &str, now: Instant) -> bool {
        let fresh = RateLimitEntry { count: 0, reset_at: window_end(now, self.window) };

        let mut entries = self.lock();
        let entry = entries.entry(client_id.to_owned()).or_insert(fresh);
        if now > entry.reset_at {
            *entry = fresh;
        }
        entry.count = entry.count.saturating_add(1);

        entry.count <= self.max_requests
    }

    /// Drop entries whose window has ended. Returns how many were removed.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.reset_at);
        before - entries.len()
    }

    pub fn entry(&self, client_id: &str) -> Option<RateLimitEntry> {
        self.lock().get(client_id).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave an entry half-written.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// End of a window opened at `now`. A window too large to represent falls
/// back to the default length.
fn window_end(now: Instant, window: Duration) -> Instant {
    now.checked_add(window)
        .unwrap_or_else(|| now + RateLimitConfig::default().window)
}

/// Derive the rate-limit key: first `X-Forwarded-For` hop, then `X-Real-IP`,
/// then the TCP peer address.
pub fn client_identifier(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        let first = forwarded.split(',').next().unwrap_or(forwarded).trim();
        return first.to_string();
    }

    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
