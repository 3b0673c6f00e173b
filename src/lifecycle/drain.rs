//! Per-route in-flight request accounting.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{timeout, Instant};

#[derive(Debug, Default)]
struct Gate {
    closed: AtomicBool,
    active: AtomicUsize,
    drained: Notify,
}

/// Counts a route's live exchanges and refuses new ones once closed.
///
/// Every admitted request holds an [`InFlightGuard`] until its response
/// body has been fully relayed; dropping the guard releases the slot.
/// Shutdown closes the gate and waits for the count to reach zero
/// within the route's grace period.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    gate: Arc<Gate>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits one request, or `None` once the gate is closed.
    pub fn guard(&self) -> Option<InFlightGuard> {
        if self.gate.closed.load(Ordering::Acquire) {
            return None;
        }
        self.gate.active.fetch_add(1, Ordering::AcqRel);
        Some(InFlightGuard {
            gate: Arc::clone(&self.gate),
        })
    }

    /// Stops admitting new requests. Already admitted ones keep running.
    pub fn close(&self) {
        self.gate.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.gate.closed.load(Ordering::Acquire)
    }

    /// Requests admitted and not yet released.
    pub fn active(&self) -> usize {
        self.gate.active.load(Ordering::Acquire)
    }

    /// Waits until the count reaches zero or `grace` elapses.
    ///
    /// Returns true when the route drained completely.
    pub async fn drain(&self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        loop {
            let released = self.gate.drained.notified();
            if self.active() == 0 {
                return true;
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            if timeout(remaining, released).await.is_err() {
                return self.active() == 0;
            }
        }
    }
}

/// Slot held for the lifetime of one admitted exchange.
#[derive(Debug)]
pub struct InFlightGuard {
    gate: Arc<Gate>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.gate.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.gate.drained.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_count_and_release() {
        let in_flight = InFlight::new();
        assert_eq!(in_flight.active(), 0);

        let first = in_flight.guard().unwrap();
        let second = in_flight.guard().unwrap();
        assert_eq!(in_flight.active(), 2);

        drop(first);
        assert_eq!(in_flight.active(), 1);
        drop(second);
        assert_eq!(in_flight.active(), 0);
    }

    #[test]
    fn closed_gate_refuses_new_requests() {
        let in_flight = InFlight::new();
        let held = in_flight.guard().unwrap();

        in_flight.close();
        assert!(in_flight.is_closed());
        assert!(in_flight.guard().is_none());

        // the request admitted before the close still counts
        assert_eq!(in_flight.active(), 1);
        drop(held);
        assert_eq!(in_flight.active(), 0);
    }

    #[tokio::test]
    async fn drain_returns_immediately_when_idle() {
        let in_flight = InFlight::new();
        assert!(in_flight.drain(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn drain_waits_for_the_last_release() {
        let in_flight = InFlight::new();
        let guard = in_flight.guard().unwrap();

        let (_, drained) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                drop(guard);
            },
            in_flight.drain(Duration::from_secs(5)),
        );
        assert!(drained);
        assert_eq!(in_flight.active(), 0);
    }

    #[tokio::test]
    async fn drain_gives_up_after_the_grace_period() {
        let in_flight = InFlight::new();
        let _held = in_flight.guard().unwrap();

        assert!(!in_flight.drain(Duration::from_millis(30)).await);
        assert_eq!(in_flight.active(), 1);
    }
}
