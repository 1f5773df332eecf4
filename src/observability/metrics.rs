use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::storage::Collection;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounter,
    pub order_transitions_total: IntCounterVec,
    pub rejected_transitions_total: IntCounterVec,
    pub storage_writes_total: IntCounterVec,
    pub active_tracking_sessions: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total =
            IntCounter::new("orders_created_total", "Total orders placed at checkout")
                .expect("valid orders_created_total metric");

        let order_transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Applied order transitions by target status"),
            &["to"],
        )
        .expect("valid order_transitions_total metric");

        let rejected_transitions_total = IntCounterVec::new(
            Opts::new("rejected_transitions_total", "Rejected order transitions by reason"),
            &["reason"],
        )
        .expect("valid rejected_transitions_total metric");

        let storage_writes_total = IntCounterVec::new(
            Opts::new("storage_writes_total", "Blob writes by collection and outcome"),
            &["collection", "outcome"],
        )
        .expect("valid storage_writes_total metric");

        let active_tracking_sessions = IntGauge::new(
            "active_tracking_sessions",
            "Currently running courier position simulations",
        )
        .expect("valid active_tracking_sessions metric");

        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(rejected_transitions_total.clone()))
            .expect("register rejected_transitions_total");
        registry
            .register(Box::new(storage_writes_total.clone()))
            .expect("register storage_writes_total");
        registry
            .register(Box::new(active_tracking_sessions.clone()))
            .expect("register active_tracking_sessions");

        Self {
            registry,
            orders_created_total,
            order_transitions_total,
            rejected_transitions_total,
            storage_writes_total,
            active_tracking_sessions,
        }
    }

    pub fn record_write(&self, collection: Collection, ok: bool) {
        let outcome = if ok { "success" } else { "error" };
        self.storage_writes_total
            .with_label_values(&[collection.name(), outcome])
            .inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
