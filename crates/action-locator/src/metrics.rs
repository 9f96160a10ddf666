use lazy_static::lazy_static;
use prometheus::{core::Collector, opts, IntCounterVec, Registry};
use tracing::error;

lazy_static! {
    static ref LOCATOR_RESOLUTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        opts!(
            "soul_locator_resolutions_total",
            "Element resolutions grouped by tier and outcome"
        ),
        &["tier", "outcome"]
    )
    .unwrap();
    static ref LOCATOR_ARBITER_CONSULTATIONS: IntCounterVec = IntCounterVec::new(
        opts!(
            "soul_locator_arbiter_consultations_total",
            "Arbiter consultations grouped by result"
        ),
        &["result"]
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register locator metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, LOCATOR_RESOLUTIONS_TOTAL.clone());
    register(registry, LOCATOR_ARBITER_CONSULTATIONS.clone());
}

/// `tier` is `primary`, `fallback`, `relaxed` or `all` (for misses).
pub fn record_resolution(tier: &str, outcome: &str) {
    LOCATOR_RESOLUTIONS_TOTAL
        .with_label_values(&[tier, outcome])
        .inc();
}

/// `result` is `picked`, `deferred`, `invalid` or `timeout`.
pub fn record_arbiter(result: &str) {
    LOCATOR_ARBITER_CONSULTATIONS
        .with_label_values(&[result])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_idempotent() {
        let registry = Registry::new();
        register_metrics(&registry);
        register_metrics(&registry);
        record_resolution("primary", "found");
        record_arbiter("deferred");
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|family| family.get_name() == "soul_locator_resolutions_total"));
    }
}
