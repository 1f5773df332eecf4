//! Simulated courier movement for the order tracking view.
//!
//! A [`CourierSimulation`] runs only while someone is watching an order that
//! is out for delivery. Every tick it moves the displayed courier position a
//! tenth of the way to the drop-off point. Nothing here touches the store.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::geo::step_toward;
use crate::models::GeoPoint;
use crate::observability::metrics::Metrics;

/// Running position simulation. Dropping the handle stops the task.
pub struct CourierSimulation {
    session_id: Uuid,
    position: watch::Receiver<GeoPoint>,
    task: JoinHandle<()>,
    metrics: Metrics,
}

impl CourierSimulation {
    pub fn start(start: GeoPoint, target: GeoPoint, tick: Duration, metrics: Metrics) -> Self {
        let session_id = Uuid::new_v4();
        let (tx, position) = watch::channel(start);

        let task = tokio::spawn(async move {
            let mut ticker = interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let next = step_toward(&tx.borrow(), &target);
                if tx.send(next).is_err() {
                    break;
                }
            }
        });

        metrics.active_tracking_sessions.inc();
        debug!(session_id = %session_id, "courier simulation started");

        Self {
            session_id,
            position,
            task,
            metrics,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn current(&self) -> GeoPoint {
        *self.position.borrow()
    }

    /// Receiver that observes every new position.
    pub fn subscribe(&self) -> watch::Receiver<GeoPoint> {
        self.position.clone()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for CourierSimulation {
    fn drop(&mut self) {
        self.task.abort();
        self.metrics.active_tracking_sessions.dec();
        debug!(session_id = %self.session_id, "courier simulation stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST_TICK: Duration = Duration::from_millis(100);

    fn origin_to_ten(tick: Duration, metrics: Metrics) -> CourierSimulation {
        CourierSimulation::start(
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(10.0, 10.0),
            tick,
            metrics,
        )
    }

    #[tokio::test]
    async fn first_tick_moves_a_tenth_of_the_way() {
        let sim = origin_to_ten(FAST_TICK, Metrics::new());
        let mut rx = sim.subscribe();

        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .unwrap()
            .unwrap();
        let position = *rx.borrow();
        assert!((position.lat - 1.0).abs() < 1e-12);
        assert!((position.lng - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn position_holds_still_between_ticks() {
        let sim = origin_to_ten(Duration::from_secs(60), Metrics::new());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sim.current(), GeoPoint::new(0.0, 0.0));
    }

    #[tokio::test]
    async fn dropping_the_handle_stops_updates_and_session_gauge() {
        let metrics = Metrics::new();
        let sim = origin_to_ten(FAST_TICK, metrics.clone());
        let mut rx = sim.subscribe();
        assert_eq!(metrics.active_tracking_sessions.get(), 1);

        sim.stop();
        assert_eq!(metrics.active_tracking_sessions.get(), 0);

        // The sender lives inside the aborted task, so the channel closes.
        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            while rx.changed().await.is_ok() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
