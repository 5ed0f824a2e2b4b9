//! Metrics collector that forwards to several backends.

use std::sync::Arc;

use contracts::{ContractError, Counter, Gauge, MetricsCollector};

struct TeeGauge(Vec<Arc<dyn Gauge>>);

impl Gauge for TeeGauge {
    fn set(&self, value: f64) {
        for gauge in &self.0 {
            gauge.set(value);
        }
    }
}

struct TeeCounter(Vec<Arc<dyn Counter>>);

impl Counter for TeeCounter {
    fn add(&self, n: u64) {
        for counter in &self.0 {
            counter.add(n);
        }
    }
}

/// Every handle it returns updates all wrapped collectors
#[derive(Default)]
pub struct TeeCollector {
    collectors: Vec<Arc<dyn MetricsCollector>>,
}

impl TeeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, collector: Arc<dyn MetricsCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    fn counters(
        &self,
        get: impl Fn(&dyn MetricsCollector) -> Result<Arc<dyn Counter>, ContractError>,
    ) -> Result<Arc<dyn Counter>, ContractError> {
        let handles = self
            .collectors
            .iter()
            .map(|c| get(c.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Arc::new(TeeCounter(handles)))
    }
}

impl MetricsCollector for TeeCollector {
    fn queue_size_gauge(&self, target: &str) -> Result<Arc<dyn Gauge>, ContractError> {
        let handles = self
            .collectors
            .iter()
            .map(|c| c.queue_size_gauge(target))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Arc::new(TeeGauge(handles)))
    }

    fn logged_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError> {
        self.counters(|c| c.logged_counter(target))
    }

    fn error_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError> {
        self.counters(|c| c.error_counter(target))
    }

    fn dropped_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError> {
        self.counters(|c| c.dropped_counter(target))
    }

    fn blocked_counter(&self, target: &str) -> Result<Arc<dyn Counter>, ContractError> {
        self.counters(|c| c.blocked_counter(target))
    }
}
