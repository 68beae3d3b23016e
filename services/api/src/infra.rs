use kpi_bonus::bonus::seed::install_defaults;
use kpi_bonus::bonus::{BonusService, BonusServiceError, InMemoryBonusStore, Month};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Builds a service over a fresh in-memory store, optionally with the reference data installed.
pub(crate) fn in_memory_service(
    seed_defaults: bool,
) -> Result<BonusService<InMemoryBonusStore>, BonusServiceError> {
    let store = Arc::new(InMemoryBonusStore::new());
    if seed_defaults {
        install_defaults(store.as_ref())?;
    }
    Ok(BonusService::new(store))
}

pub(crate) fn parse_month(value: &str) -> Result<Month, String> {
    value.parse::<Month>().map_err(|err| err.to_string())
}
