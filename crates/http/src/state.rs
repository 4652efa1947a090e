//! Shared client state and advisory notifications
//!
//! One `SharedState` is owned per client instance (never module-global, so
//! tests can construct independent clients without cross-contamination).
//! It carries the cached server metadata, the advisory backoff release
//! time, and the notification channel. Invalidation points: `set_headers`
//! on the client, and constructing a fresh client.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use carton_domain::ServerInfo;
use tokio::sync::broadcast;

/// Advisory notifications emitted by the transport.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The server flagged the endpoint as deprecated via an `Alert` header.
    Deprecated {
        message: String,
        url: String,
    },
    /// The server advertised a backpressure window via a `Backoff` header.
    /// Nothing blocks automatically; callers may throttle themselves.
    Backoff {
        seconds: u64,
    },
    /// The server mandated a delay before a retry via `Retry-After`.
    RetryAfter {
        /// Absolute release time after which the request may be retried.
        release: SystemTime,
    },
}

/// Process-wide (per-client) mutable state.
#[derive(Debug)]
pub struct SharedState {
    server_info: Mutex<Option<ServerInfo>>,
    backoff_release: Mutex<Option<Instant>>,
    events: broadcast::Sender<ClientEvent>,
}

impl SharedState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self { server_info: Mutex::new(None), backoff_release: Mutex::new(None), events }
    }

    /// Subscribe to advisory notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Emit a notification; silently dropped when nobody listens.
    pub fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    pub fn cached_server_info(&self) -> Option<ServerInfo> {
        self.server_info.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn cache_server_info(&self, info: ServerInfo) {
        *self.server_info.lock().unwrap_or_else(PoisonError::into_inner) = Some(info);
    }

    /// Drop the cached server metadata; the next call re-fetches it.
    pub fn invalidate_server_info(&self) {
        *self.server_info.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Record a `Backoff` header: release time = now + seconds.
    pub fn set_backoff(&self, seconds: u64) {
        let release = Instant::now() + Duration::from_secs(seconds);
        *self.backoff_release.lock().unwrap_or_else(PoisonError::into_inner) = Some(release);
    }

    /// Remaining advisory backoff window; zero when none is active.
    /// Reading this never blocks a call.
    pub fn backoff_remaining(&self) -> Duration {
        self.backoff_release
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|release| release.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
