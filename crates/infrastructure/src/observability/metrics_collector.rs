//! Metrics collector for the tiered collection scheduler
//!
//! Thin wrapper over the `metrics` facade. Nothing is exported unless a
//! recorder is installed, see [`install_prometheus_exporter`].

use std::net::SocketAddr;

use anyhow::Result;
use collector_core::{BatchStatus, BatchSummary, CollectionJob, TierStatistics};
use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

pub struct MetricsCollector {
    job_retries_total: Counter,
    circuit_open_rejections_total: Counter,
    schedule_refreshes_total: Counter,
    schedule_refresh_failures_total: Counter,
    schedule_refresh_duration: Histogram,
    in_flight_jobs: Gauge,
    deferred_schedules: Gauge,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            job_retries_total: counter!("collector_job_retries_total"),
            circuit_open_rejections_total: counter!("collector_circuit_open_rejections_total"),
            schedule_refreshes_total: counter!("collector_schedule_refreshes_total"),
            schedule_refresh_failures_total: counter!(
                "collector_schedule_refresh_failures_total"
            ),
            schedule_refresh_duration: histogram!(
                "collector_schedule_refresh_duration_seconds"
            ),
            in_flight_jobs: gauge!("collector_in_flight_jobs"),
            deferred_schedules: gauge!("collector_deferred_schedules"),
        }
    }

    /// Record a finished job (completed or failed)
    pub fn record_job(&self, job: &CollectionJob) {
        let tier = job.tier.to_string();
        let status = if job.is_completed() { "completed" } else { "failed" };

        counter!(
            "collector_jobs_total",
            "tier" => tier.clone(),
            "timeframe" => job.timeframe.as_str(),
            "status" => status
        )
        .increment(1);
        histogram!("collector_job_duration_seconds", "tier" => tier.clone())
            .record(job.execution_time_ms as f64 / 1000.0);

        if job.is_completed() {
            counter!("collector_records_collected_total", "tier" => tier)
                .increment(job.records_collected.max(0) as u64);
        }
    }

    pub fn record_job_retry(&self) {
        self.job_retries_total.increment(1);
    }

    pub fn record_circuit_rejection(&self) {
        self.circuit_open_rejections_total.increment(1);
    }

    /// Record a finished batch
    pub fn record_batch(&self, summary: &BatchSummary) {
        let status = match summary.status {
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Running => "running",
        };

        counter!(
            "collector_batches_total",
            "tier" => summary.tier.to_string(),
            "timeframe" => summary.timeframe.as_str(),
            "status" => status
        )
        .increment(1);
        histogram!("collector_batch_duration_seconds", "tier" => summary.tier.to_string())
            .record(summary.elapsed_ms as f64 / 1000.0);
    }

    pub fn record_schedule_refresh(&self, success: bool, duration_seconds: f64) {
        self.schedule_refreshes_total.increment(1);
        if !success {
            self.schedule_refresh_failures_total.increment(1);
        }
        self.schedule_refresh_duration.record(duration_seconds);
    }

    pub fn update_tier_statistics(&self, stats: &TierStatistics) {
        gauge!("collector_tier_assets", "tier" => stats.tier.to_string())
            .set(stats.asset_count as f64);
        gauge!("collector_tier_activity_score", "tier" => stats.tier.to_string())
            .set(stats.average_activity_score);
    }

    pub fn update_in_flight_jobs(&self, count: usize) {
        self.in_flight_jobs.set(count as f64);
    }

    pub fn update_deferred_schedules(&self, count: usize) {
        self.deferred_schedules.set(count as f64);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the global Prometheus recorder with an HTTP scrape endpoint.
///
/// Must be called from within a tokio runtime.
pub fn install_prometheus_exporter(bind_address: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(bind_address)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    info!(%bind_address, "Prometheus exporter listening");
    Ok(())
}
