//! Time-windowed store of radar returns.
//!
//! A *radar return* is one received [`PositionUpdate`] stamped with the
//! instant it arrived and the session it came from.  The display draws the
//! newest return of each aircraft as its target and the older ones as a
//! fading trail, so the store keeps every return for a fixed retention
//! window and a background sweep drops anything older.
//!
//! # Ordering
//!
//! Returns are appended in arrival order, so the buffer is sorted by
//! `received` from front to back.  A sweep therefore only ever removes from
//! the front.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use radar_core::sync::lock;
use radar_core::{ConnectionId, PositionUpdate};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Identifier of the plane session a return arrived on.
pub type SessionId = ConnectionId;

/// How long a return stays visible.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(5);

/// How often the sweep task runs.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(250);

// ── RadarReturn ───────────────────────────────────────────────────────────────

/// One received position update with its arrival metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadarReturn {
    pub update: PositionUpdate,
    /// Monotonic arrival time.
    pub received: Instant,
    /// Session the update arrived on.  The session may since have closed.
    pub origin: SessionId,
}

impl RadarReturn {
    pub fn new(update: PositionUpdate, received: Instant, origin: SessionId) -> Self {
        Self { update, received, origin }
    }

    /// Age of this return at `now`.  Zero if `now` precedes `received`.
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.received)
    }
}

// ── RadarReturnStore ──────────────────────────────────────────────────────────

/// Thread-safe, append-only (until swept) collection of [`RadarReturn`]s.
///
/// Every session's read loop appends concurrently; the display and the sweep
/// task read and prune.  All operations take one short mutex hold.
#[derive(Debug)]
pub struct RadarReturnStore {
    returns: Mutex<VecDeque<RadarReturn>>,
    retention: Duration,
}

impl Default for RadarReturnStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl RadarReturnStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            returns: Mutex::new(VecDeque::new()),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Adds a return.  No deduplication: two identical updates are two
    /// returns.
    pub fn append(&self, radar_return: RadarReturn) {
        let mut returns = lock(&self.returns);
        // Arrival stamps come from different sessions' tasks and can land a
        // hair out of order; insert from the back to keep the buffer sorted.
        let at = returns
            .iter()
            .rposition(|r| r.received <= radar_return.received)
            .map_or(0, |i| i + 1);
        returns.insert(at, radar_return);
        trace!(call_sign = %radar_return.update.call_sign, "radar return recorded");
    }

    /// Removes every return older than the retention window, measured now.
    /// Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Removes every return whose age at `now` exceeds the retention window.
    /// A return exactly `retention` old survives.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut returns = lock(&self.returns);
        let before = returns.len();
        while returns.front().is_some_and(|r| r.age_at(now) > self.retention) {
            returns.pop_front();
        }
        before - returns.len()
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<RadarReturn> {
        lock(&self.returns).iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.returns).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.returns).is_empty()
    }
}

/// Spawns the periodic sweep.  Runs until `cancel` fires.
///
/// A tick that runs late is delayed rather than bursted; the sweep is
/// idempotent so skipping ahead loses nothing.
pub fn spawn_sweeper(store: Arc<RadarReturnStore>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = store.sweep();
                    if removed > 0 {
                        debug!(removed, remaining = store.len(), "expired radar returns");
                    }
                }
            }
        }
        debug!("radar return sweeper stopped");
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
