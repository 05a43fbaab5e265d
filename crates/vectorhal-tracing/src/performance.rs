//! Performance-focused tracing utilities
//!
//! Timing spans with threshold filtering plus standard events for the three
//! things the HAL does that cost time: allocating, moving bytes, and running
//! a kernel.
//!
//! Whether anything is recorded, and the minimum duration worth recording,
//! are process-wide settings. [`crate::init_global_tracing`] applies them from
//! [`crate::TracingConfig`]; [`configure`] sets them directly.
//!
//! ```rust
//! use vectorhal_tracing::performance::{record_transfer, PerformanceSpan};
//!
//! let span = PerformanceSpan::new("h2d_copy", Some(100));
//! drop(span); // logged only if it took at least 100μs
//!
//! record_transfer(4096, "H2D", 250);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::Level;

static ENABLED: AtomicBool = AtomicBool::new(true);
static THRESHOLD_US: AtomicU64 = AtomicU64::new(0);

/// Turn performance records on or off and set the minimum duration logged.
///
/// `threshold_us = None` logs every duration.
pub fn configure(enabled: bool, threshold_us: Option<u64>) {
    ENABLED.store(enabled, Ordering::Relaxed);
    THRESHOLD_US.store(threshold_us.unwrap_or(0), Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Process-wide minimum duration, `None` when every duration is logged.
pub fn threshold_us() -> Option<u64> {
    match THRESHOLD_US.load(Ordering::Relaxed) {
        0 => None,
        threshold => Some(threshold),
    }
}

/// True when a measurement of `duration_us` should be logged.
pub fn should_record(duration_us: u64) -> bool {
    is_enabled() && duration_us >= THRESHOLD_US.load(Ordering::Relaxed)
}

/// RAII guard that measures its own lifetime and logs it on drop when
/// performance tracing is enabled and the duration reaches the threshold.
pub struct PerformanceSpan {
    span_name: String,
    threshold_us: Option<u64>,
    start_time: Instant,
    span: tracing::Span,
}

impl PerformanceSpan {
    /// Create a debug-level span. `threshold_us = None` logs unconditionally.
    pub fn new(span_name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        Self::with_level(Level::DEBUG, span_name, threshold_us)
    }

    /// Create a span using the process-wide threshold.
    pub fn configured(span_name: impl Into<String>) -> Self {
        Self::new(span_name, threshold_us())
    }

    /// Create a span at the given tracing level.
    pub fn with_level(level: Level, span_name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let span_name = span_name.into();
        let span = match level {
            Level::TRACE => tracing::trace_span!("perf", name = %span_name),
            Level::DEBUG => tracing::debug_span!("perf", name = %span_name),
            Level::INFO => tracing::info_span!("perf", name = %span_name),
            Level::WARN => tracing::warn_span!("perf", name = %span_name),
            Level::ERROR => tracing::error_span!("perf", name = %span_name),
        };

        Self {
            span_name,
            threshold_us,
            start_time: Instant::now(),
            span,
        }
    }

    /// Name given at construction.
    pub fn name(&self) -> &str {
        &self.span_name
    }

    /// Microseconds since the span was created.
    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }

    /// Enter this span's context.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        let elapsed_us = self.elapsed_us();

        if is_enabled() && self.threshold_us.map_or(true, |t| elapsed_us >= t) {
            let _entered = self.span.enter();
            tracing::debug!(
                duration_us = elapsed_us,
                duration_ms = elapsed_us as f64 / 1000.0,
                "performance_span_complete"
            );
        }
    }
}

/// Record a memory allocation.
///
/// `memory_class` names where the bytes live (`"host"`, `"host_visible"`,
/// `"device_exclusive"`).
pub fn record_allocation(size_bytes: usize, memory_class: &str, alignment: usize, duration_us: u64) {
    if !should_record(duration_us) {
        return;
    }
    tracing::debug!(
        event = "allocation",
        size_bytes = size_bytes,
        size_kb = size_bytes as f64 / 1024.0,
        memory_class = memory_class,
        alignment = alignment,
        duration_us = duration_us,
        "memory_allocation"
    );
}

/// Bandwidth in MiB/s for `bytes` moved in `duration_us`.
pub fn bandwidth_mibps(bytes: usize, duration_us: u64) -> f64 {
    if duration_us > 0 {
        (bytes as f64 / duration_us as f64) * 1_000_000.0 / (1024.0 * 1024.0)
    } else {
        0.0
    }
}

/// Record a data transfer with bandwidth.
///
/// `direction` is one of `"H2H"`, `"H2D"`, `"D2H"`, `"D2D"`.
pub fn record_transfer(bytes: usize, direction: &str, duration_us: u64) {
    if !should_record(duration_us) {
        return;
    }
    let bandwidth = bandwidth_mibps(bytes, duration_us);

    tracing::debug!(
        event = "transfer",
        bytes = bytes,
        direction = direction,
        duration_us = duration_us,
        bandwidth_mibps = bandwidth,
        "data_transfer"
    );
}

/// Elements processed per second.
pub fn elements_per_sec(elements: usize, duration_us: u64) -> f64 {
    if duration_us > 0 {
        (elements as f64 / duration_us as f64) * 1_000_000.0
    } else {
        0.0
    }
}

/// Record one kernel submission.
pub fn record_submission(kernel: &str, backend: &str, elements: usize, duration_us: u64) {
    if !should_record(duration_us) {
        return;
    }
    let throughput = elements_per_sec(elements, duration_us);

    tracing::debug!(
        event = "submission",
        kernel = kernel,
        backend = backend,
        elements = elements,
        duration_us = duration_us,
        elements_per_sec = throughput,
        melems_per_sec = throughput / 1_000_000.0,
        "kernel_submission"
    );
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};
    use std::thread;
    use std::time::Duration;

    // Serialises tests that change the process-wide settings.
    static SETTINGS_LOCK: Mutex<()> = Mutex::new(());

    pub(crate) fn lock_settings() -> MutexGuard<'static, ()> {
        SETTINGS_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn test_performance_span_creation() {
        let span = PerformanceSpan::new("test_span", None);
        assert_eq!(span.name(), "test_span");
        assert_eq!(span.threshold_us, None);
    }

    #[test]
    fn test_performance_span_with_level() {
        let span = PerformanceSpan::with_level(Level::INFO, "queue_submit", Some(100));
        assert_eq!(span.name(), "queue_submit");
        assert_eq!(span.threshold_us, Some(100));
    }

    #[test]
    fn test_performance_span_elapsed() {
        let span = PerformanceSpan::new("test_span", None);
        thread::sleep(Duration::from_millis(5));
        assert!(span.elapsed_us() >= 5_000);
    }

    #[test]
    fn test_record_helpers_do_not_panic() {
        record_allocation(1024, "host", 64, 10);
        record_transfer(4096, "H2D", 250);
        record_submission("lzc", "cpu", 128, 3);
    }

    #[test]
    fn test_settings_gate_records() {
        let _guard = lock_settings();

        configure(true, None);
        assert!(should_record(0));
        assert_eq!(threshold_us(), None);

        configure(true, Some(100));
        assert_eq!(threshold_us(), Some(100));
        assert!(!should_record(99));
        assert!(should_record(100));
        assert_eq!(PerformanceSpan::configured("submit").threshold_us, Some(100));

        configure(false, None);
        assert!(!is_enabled());
        assert!(!should_record(u64::MAX));

        configure(true, None);
    }

    #[test]
    fn test_bandwidth_calculation() {
        // 1 MiB in 1ms = 1000 MiB/s
        let bandwidth = bandwidth_mibps(1024 * 1024, 1000);
        assert!((bandwidth - 1000.0).abs() < 0.01);
        assert_eq!(bandwidth_mibps(1024, 0), 0.0);
    }

    #[test]
    fn test_throughput_calculation() {
        let rate = elements_per_sec(1_000_000, 1000);
        assert!((rate - 1_000_000_000.0).abs() < 1.0);
        assert_eq!(elements_per_sec(10, 0), 0.0);
    }
}
