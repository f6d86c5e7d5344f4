//! Prometheus registry for benchmark progress.
//!
//! Five fixed series. Label combinations accumulate for the life of the
//! process; keep `model × sweep_type × config` small.

use std::sync::{Arc, OnceLock};

use prometheus::{CounterVec, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};

struct Series {
    registry: Registry,
    throughput_tps: GaugeVec,
    sweeps_total: CounterVec,
    errors_total: CounterVec,
    last_sweep_ts: Gauge,
    best_throughput: GaugeVec,
}

impl Series {
    fn build() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let throughput_tps = GaugeVec::new(
            Opts::new(
                "llama_benchmark_throughput_tps",
                "Tokens per second for the most recent measurement",
            ),
            &["model", "sweep_type", "config"],
        )?;
        let sweeps_total = CounterVec::new(
            Opts::new("llama_benchmark_sweeps_total", "Total number of completed sweeps"),
            &["sweep_type"],
        )?;
        let errors_total = CounterVec::new(
            Opts::new("llama_benchmark_errors_total", "Total benchmark errors"),
            &["sweep_type"],
        )?;
        let last_sweep_ts = Gauge::new(
            "llama_benchmark_last_sweep_timestamp",
            "Unix timestamp of most recent completed sweep",
        )?;
        let best_throughput = GaugeVec::new(
            Opts::new(
                "llama_benchmark_best_throughput_tps",
                "Best throughput achieved across all sweeps",
            ),
            &["model", "sweep_type"],
        )?;

        registry.register(Box::new(throughput_tps.clone()))?;
        registry.register(Box::new(sweeps_total.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(last_sweep_ts.clone()))?;
        registry.register(Box::new(best_throughput.clone()))?;

        Ok(Self {
            registry,
            throughput_tps,
            sweeps_total,
            errors_total,
            last_sweep_ts,
            best_throughput,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MetricsRegistry
// ═══════════════════════════════════════════════════════════════

/// Cheap-to-clone handle to the benchmark series.
///
/// Decided once at construction: if the series cannot be built the
/// handle is disabled and every call is a no-op.
#[derive(Clone)]
pub struct MetricsRegistry {
    inner: Option<Arc<Series>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        match Series::build() {
            Ok(series) => Self { inner: Some(Arc::new(series)) },
            Err(e) => {
                tracing::warn!(error = %e, "metrics disabled");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Process-wide instance for harness code that does not carry a handle.
    pub fn global() -> &'static MetricsRegistry {
        static GLOBAL: OnceLock<MetricsRegistry> = OnceLock::new();
        GLOBAL.get_or_init(MetricsRegistry::new)
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// One measurement cell: overwrite throughput, add `errors` if any.
    pub fn record_cell(
        &self,
        model: &str,
        sweep_type: &str,
        config_label: &str,
        throughput_tps: f64,
        errors: u64,
    ) {
        let Some(s) = &self.inner else { return };
        s.throughput_tps
            .with_label_values(&[model, sweep_type, config_label])
            .set(throughput_tps);
        if errors > 0 {
            s.errors_total
                .with_label_values(&[sweep_type])
                .inc_by(errors as f64);
        }
    }

    pub fn record_sweep_completion(&self, model: &str, sweep_type: &str, best_throughput: f64) {
        let Some(s) = &self.inner else { return };
        s.sweeps_total.with_label_values(&[sweep_type]).inc();
        s.last_sweep_ts.set(unix_now());
        s.best_throughput
            .with_label_values(&[model, sweep_type])
            .set(best_throughput);
    }

    /// Text exposition of the current snapshot. `None` when disabled.
    pub fn render(&self) -> Option<Vec<u8>> {
        let s = self.inner.as_ref()?;
        let mut buf = Vec::new();
        match TextEncoder::new().encode(&s.registry.gather(), &mut buf) {
            Ok(()) => Some(buf),
            Err(e) => {
                tracing::debug!(error = %e, "metrics encode failed");
                None
            }
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Content type of `render()` output.
pub fn content_type() -> &'static str {
    prometheus::TEXT_FORMAT
}

fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
