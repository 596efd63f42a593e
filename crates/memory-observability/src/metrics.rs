//! In-process operation counters/histograms, grounded in the teacher's
//! `observability::metrics::MetricsCollector` (same counter/gauge/histogram
//! shape over `tokio::sync::RwLock<HashMap<..>>`), scoped down to the
//! engine's own operations rather than the teacher's full resource+business
//! metric surface.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct EngineMetrics {
    counters: Arc<RwLock<HashMap<String, u64>>>,
    histograms: Arc<RwLock<HashMap<String, Vec<f64>>>>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_operation(&self, operation: &str, duration_ms: f64, success: bool) {
        let status = if success { "success" } else { "failure" };
        self.increment(&format!("{operation}.{status}")).await;
        self.observe(&format!("{operation}.duration_ms"), duration_ms)
            .await;
    }

    pub async fn increment(&self, key: &str) {
        let mut counters = self.counters.write().await;
        *counters.entry(key.to_string()).or_insert(0) += 1;
    }

    pub async fn observe(&self, key: &str, value: f64) {
        let mut histograms = self.histograms.write().await;
        let series = histograms.entry(key.to_string()).or_default();
        series.push(value);
        if series.len() > 1000 {
            series.remove(0);
        }
    }

    pub async fn counter(&self, key: &str) -> u64 {
        self.counters.read().await.get(key).copied().unwrap_or(0)
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.read().await.clone(),
            histogram_counts: self
                .histograms
                .read()
                .await
                .iter()
                .map(|(k, v)| (k.clone(), v.len()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub histogram_counts: HashMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_success_and_failure_counters_separately() {
        let metrics = EngineMetrics::new();
        metrics.record_operation("add", 12.0, true).await;
        metrics.record_operation("add", 40.0, false).await;

        assert_eq!(metrics.counter("add.success").await, 1);
        assert_eq!(metrics.counter("add.failure").await, 1);

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.histogram_counts.get("add.duration_ms"), Some(&2));
    }
}
