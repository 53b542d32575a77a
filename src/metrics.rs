//! Performance metrics and statistics tracking for the change detection service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for detection requests
pub struct ServiceMetrics {
    /// Detections that produced a result
    pub detections_completed: AtomicU64,
    /// Detections that ended in an error
    pub detections_failed: AtomicU64,
    /// Completed detections whose change ratio could not be measured
    pub unmeasured: AtomicU64,
    /// Failures keyed by pipeline step
    failures_by_stage: RwLock<HashMap<String, u64>>,
    /// End-to-end processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Model forward pass times (in microseconds)
    inference_times: RwLock<Vec<u64>>,
    /// Change percentage distribution, 10 buckets of 10%
    change_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            detections_completed: AtomicU64::new(0),
            detections_failed: AtomicU64::new(0),
            unmeasured: AtomicU64::new(0),
            failures_by_stage: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            inference_times: RwLock::new(Vec::with_capacity(1000)),
            change_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a completed detection
    pub fn record_detection(&self, processing_time: Duration, percentage_change: Option<f64>) {
        self.detections_completed.fetch_add(1, Ordering::Relaxed);
        push_sample(&self.processing_times, processing_time, 10000);

        match percentage_change {
            Some(pct) => {
                let bucket = ((pct / 10.0) as usize).min(9);
                if let Ok(mut buckets) = self.change_buckets.write() {
                    buckets[bucket] += 1;
                }
            }
            None => {
                self.unmeasured.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record a model forward pass
    pub fn record_inference(&self, duration: Duration) {
        push_sample(&self.inference_times, duration, 10000);
    }

    /// Record a failed detection at the given step
    pub fn record_failure(&self, stage: &str) {
        self.detections_failed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_stage) = self.failures_by_stage.write() {
            *by_stage.entry(stage.to_string()).or_insert(0) += 1;
        }
    }

    /// Get end-to-end processing time statistics
    pub fn get_processing_stats(&self) -> LatencyStats {
        latency_stats(&self.processing_times)
    }

    /// Get model forward pass statistics
    pub fn get_inference_stats(&self) -> LatencyStats {
        latency_stats(&self.inference_times)
    }

    /// Get current throughput (detections per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.detections_completed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get change percentage distribution
    pub fn get_change_distribution(&self) -> [u64; 10] {
        self.change_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or([0; 10])
    }

    /// Get failures by pipeline step
    pub fn get_failures_by_stage(&self) -> HashMap<String, u64> {
        self.failures_by_stage
            .read()
            .map(|by_stage| by_stage.clone())
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let completed = self.detections_completed.load(Ordering::Relaxed);
        let failed = self.detections_failed.load(Ordering::Relaxed);
        let unmeasured = self.unmeasured.load(Ordering::Relaxed);
        let total = completed + failed;
        let failure_rate = if total > 0 {
            (failed as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let inference = self.get_inference_stats();
        let throughput = self.get_throughput();
        let failures = self.get_failures_by_stage();
        let distribution = self.get_change_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║          CHANGE DETECTION SERVICE - METRICS SUMMARY          ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Detections Completed: {:>8}  │  Throughput: {:>6.2} req/s ║",
            completed, throughput
        );
        info!(
            "║ Detections Failed:    {:>8}  │  Failure Rate: {:>5.1}%    ║",
            failed, failure_rate
        );
        info!("║ Unmeasured Results:   {:>8}                               ║", unmeasured);
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Request Time (ms):   mean={:>6} p50={:>6} p95={:>6} p99={:>6} ║",
            processing.mean_us / 1000,
            processing.p50_us / 1000,
            processing.p95_us / 1000,
            processing.p99_us / 1000
        );
        info!(
            "║ Inference Time (ms): mean={:>6} p50={:>6} p95={:>6} p99={:>6} ║",
            inference.mean_us / 1000,
            inference.p50_us / 1000,
            inference.p95_us / 1000,
            inference.p99_us / 1000
        );
        if !failures.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Failures by Step:                                            ║");
            for (stage, count) in &failures {
                info!("║   {:10}: {:>6}                                          ║", stage, count);
            }
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Change Percentage Distribution:                              ║");
        let measured: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if measured > 0 {
                (count as f64 / measured as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:>3}-{:>3}%: {:>6} ({:>5.1}%) {}",
                i * 10,
                (i + 1) * 10,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn push_sample(samples: &RwLock<Vec<u64>>, duration: Duration, cap: usize) {
    if let Ok(mut times) = samples.write() {
        times.push(duration.as_micros() as u64);
        if times.len() > cap {
            times.drain(0..cap / 2);
        }
    }
}

fn latency_stats(samples: &RwLock<Vec<u64>>) -> LatencyStats {
    let mut sorted = match samples.read() {
        Ok(times) if !times.is_empty() => times.clone(),
        _ => return LatencyStats::default(),
    };
    sorted.sort_unstable();

    let count = sorted.len();
    let sum: u64 = sorted.iter().sum();
    let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

    LatencyStats {
        count: count as u64,
        mean_us: sum / count as u64,
        p50_us: percentile(0.50),
        p95_us: percentile(0.95),
        p99_us: percentile(0.99),
        max_us: sorted[count - 1],
    }
}

/// Latency statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let period = Duration::from_secs(self.interval_secs.max(1));
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
