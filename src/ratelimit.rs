//! Sliding-window rate limiting keyed by client identifier.
//!
//! Each identifier owns a list of request timestamps; a request is admitted
//! when fewer than `max_requests` timestamps fall inside the configured
//! window. The window is advisory: concurrent requests for the same
//! identifier racing between the server's lock acquisitions could in theory
//! admit slightly more than the limit, which is acceptable for this use.
//!
//! The identifier map is bounded. When it would grow past `max_clients`,
//! identifiers whose whole window has expired are dropped first, then the
//! least recently seen identifier is evicted. This keeps memory use flat even
//! when every request carries a unique spoofed forwarding header.
//!
//! # Examples
//!
//! ```
//! use cosmos_predictions::ratelimit::{RateLimiter, RateLimitSettings};
//!
//! let mut limiter = RateLimiter::with_defaults(RateLimitSettings::default());
//! assert!(limiter.is_allowed("203.0.113.7"));
//! assert_eq!(limiter.remaining("203.0.113.7"), 4);
//! ```
//!
//! # Thread safety
//!
//! The limiter itself is plain mutable state; the server wraps it in a
//! `Mutex` so checks from concurrent request tasks serialize.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;
use serde::Deserialize;

/// Trait for clock abstraction to make testing easier.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> Instant;
}

/// Default clock backed by the system clock.
#[derive(Debug, Default, Clone)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Operational settings for the limiter, loaded from the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Requests admitted per identifier per window.
    pub max_requests: u32,
    /// Window length in seconds.
    pub window_secs: u64,
    /// Upper bound on tracked identifiers before eviction kicks in.
    pub max_clients: usize,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window_secs: 60,
            max_clients: 10_000,
        }
    }
}

/// Per-identifier request history.
#[derive(Debug)]
struct ClientRecord {
    requests: Vec<Instant>,
    last_seen: Instant,
}

/// Sliding-window rate limiter over client identifiers.
#[derive(Debug)]
pub struct RateLimiter<C: Clock> {
    clients: HashMap<String, ClientRecord>,
    settings: RateLimitSettings,
    clock: C,
}

impl RateLimiter<RealClock> {
    /// Create a limiter using the system clock.
    pub fn with_defaults(settings: RateLimitSettings) -> Self {
        Self::new(settings, RealClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn new(settings: RateLimitSettings, clock: C) -> Self {
        Self {
            clients: HashMap::new(),
            settings,
            clock,
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.settings.window_secs)
    }

    /// Check admission for `id` and record the request when admitted.
    ///
    /// Prunes timestamps that have left the window, then rejects without
    /// mutating the record if the remaining count already equals the limit.
    pub fn is_allowed(&mut self, id: &str) -> bool {
        let now = self.clock.now();
        let window = self.window();

        if !self.clients.contains_key(id) {
            self.make_room(now);
        }

        let record = self
            .clients
            .entry(id.to_string())
            .or_insert_with(|| ClientRecord {
                requests: Vec::new(),
                last_seen: now,
            });

        record.last_seen = now;
        record
            .requests
            .retain(|t| now.duration_since(*t) < window);

        if record.requests.len() >= self.settings.max_requests as usize {
            debug!("rate limit hit for identifier {id}");
            return false;
        }

        record.requests.push(now);
        true
    }

    /// Requests left in the current window for `id`. Non-mutating.
    pub fn remaining(&self, id: &str) -> u32 {
        let now = self.clock.now();
        let window = self.window();
        let in_window = self
            .clients
            .get(id)
            .map(|r| {
                r.requests
                    .iter()
                    .filter(|t| now.duration_since(**t) < window)
                    .count() as u32
            })
            .unwrap_or(0);
        self.settings.max_requests.saturating_sub(in_window)
    }

    /// Whole seconds (rounded up) until the oldest in-window request for
    /// `id` leaves the window and capacity frees up.
    ///
    /// Returns the full window length when nothing is recorded, which is the
    /// safe hint for a client that was just rejected.
    pub fn retry_after(&self, id: &str) -> u64 {
        let now = self.clock.now();
        let window = self.window();

        let oldest = self.clients.get(id).and_then(|r| {
            r.requests
                .iter()
                .filter(|t| now.duration_since(**t) < window)
                .min()
        });

        match oldest {
            Some(t) => {
                let remaining = window.saturating_sub(now.duration_since(*t));
                remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
            }
            None => self.settings.window_secs,
        }
    }

    /// Evict identifiers so a new one fits under `max_clients`.
    fn make_room(&mut self, now: Instant) {
        if self.clients.len() < self.settings.max_clients {
            return;
        }

        let window = self.window();
        self.clients
            .retain(|_, r| now.duration_since(r.last_seen) < window);

        // Still full: every tracked identifier is active, drop the least
        // recently seen one.
        while self.clients.len() >= self.settings.max_clients {
            let oldest = self
                .clients
                .iter()
                .min_by_key(|(_, r)| r.last_seen)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    self.clients.remove(&id);
                }
                None => break,
            }
        }
    }

    /// Number of identifiers currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}
