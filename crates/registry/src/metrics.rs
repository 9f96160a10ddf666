use lazy_static::lazy_static;
use prometheus::{core::Collector, IntCounter, IntGauge, Registry};
use tracing::error;

lazy_static! {
    static ref REGISTRY_SESSIONS_TOTAL: IntGauge =
        IntGauge::new("soul_registry_sessions_total", "Total active sessions").unwrap();
    static ref REGISTRY_PAGES_CREATED: IntCounter = IntCounter::new(
        "soul_registry_pages_created_total",
        "Pages created for sessions",
    )
    .unwrap();
    static ref REGISTRY_PAGES_EVICTED: IntCounter = IntCounter::new(
        "soul_registry_pages_evicted_total",
        "Closed pages evicted before reuse",
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register registry metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, REGISTRY_SESSIONS_TOTAL.clone());
    register(registry, REGISTRY_PAGES_CREATED.clone());
    register(registry, REGISTRY_PAGES_EVICTED.clone());
}

pub fn set_session_count(count: usize) {
    REGISTRY_SESSIONS_TOTAL.set(count as i64);
}

pub fn record_page_created() {
    REGISTRY_PAGES_CREATED.inc();
}

pub fn record_page_evicted() {
    REGISTRY_PAGES_EVICTED.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_once_per_registry() {
        let registry = Registry::new();
        register_metrics(&registry);
        register_metrics(&registry);
        record_page_created();
        let names: Vec<_> = registry
            .gather()
            .into_iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"soul_registry_pages_created_total".to_string()));
    }
}
