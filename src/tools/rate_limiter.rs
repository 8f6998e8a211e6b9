//! Sliding-window admission gate for outbound calls.
//!
//! One [`RequestGate`] protects one external dependency. Every call that could
//! overload the dependency or trip its abuse detection awaits
//! [`RequestGate::acquire`] first.
//!
//! # Algorithm
//!
//! The gate remembers the instant of each admission inside the current window:
//! - Evict admissions older than `window`
//! - If fewer than `capacity` remain, record `now` and admit
//! - Otherwise sleep until the oldest admission ages out, then re-check
//!
//! Evict, check and record run under one async mutex, and a waiting caller
//! keeps the mutex while it sleeps. Later callers queue behind it in FIFO
//! order, so two callers can never both take the last slot and nobody starves.
//!
//! # Persistence
//!
//! State is in-memory only and resets on process restart.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::GateConfig;

/// Result of a non-blocking admission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Admitted and recorded.
    Admitted {
        /// Slots left in the current window.
        remaining: usize,
    },
    /// Window is full; nothing was recorded.
    Limited {
        /// Time until the oldest admission ages out.
        retry_after: Duration,
    },
}

impl GateDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, GateDecision::Admitted { .. })
    }
}

/// Rolling-window admission controller.
///
/// Shared via `Arc` by every caller of the dependency it protects.
#[derive(Debug)]
pub struct RequestGate {
    capacity: usize,
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl RequestGate {
    /// Create a gate admitting `capacity` calls per `window`.
    ///
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize, window: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            window,
            admitted: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(config.capacity, config.window)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait for admission.
    ///
    /// Never fails. Suspends at most until the oldest admission in the window
    /// ages out for each caller queued ahead.
    pub async fn acquire(&self) {
        let mut admitted = self.admitted.lock().await;
        loop {
            let now = Instant::now();
            self.evict(&mut admitted, now);

            if admitted.len() < self.capacity {
                admitted.push_back(now);
                return;
            }

            let oldest = admitted.front().copied().unwrap_or(now);
            let ready_at = oldest + self.window;
            tracing::debug!(
                capacity = self.capacity,
                wait = ?ready_at.saturating_duration_since(now),
                "request gate full, waiting for window to roll"
            );
            tokio::time::sleep_until(ready_at).await;
        }
    }

    /// Admit if the window has room, otherwise report when it will.
    ///
    /// Never sleeps on the window, though it does queue for the mutex behind
    /// a caller already waiting in [`acquire`](Self::acquire).
    pub async fn try_acquire(&self) -> GateDecision {
        let mut admitted = self.admitted.lock().await;
        let now = Instant::now();
        self.evict(&mut admitted, now);

        if admitted.len() < self.capacity {
            admitted.push_back(now);
            return GateDecision::Admitted {
                remaining: self.capacity - admitted.len(),
            };
        }

        let retry_after = admitted
            .front()
            .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        GateDecision::Limited { retry_after }
    }

    /// Admissions currently inside the window.
    pub async fn in_window(&self) -> usize {
        let mut admitted = self.admitted.lock().await;
        self.evict(&mut admitted, Instant::now());
        admitted.len()
    }

    fn evict(&self, admitted: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = admitted.front() {
            if now.duration_since(oldest) >= self.window {
                admitted.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RequestGate {
    /// 30 admissions per 60 seconds.
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}
