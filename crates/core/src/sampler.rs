// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Periodic host telemetry capture.
//!
//! A [`MetricsSampler`] runs on its own tokio task and captures one
//! [`MetricSample`] per tick until its [`SamplerHandle`] is stopped. The
//! samples stay private to the task and are handed back in one piece when
//! the task is joined.
//!
//! A failing metric never stops sampling: the error is logged and the field
//! is left empty in that sample.
//!
//! Telemetry reads refresh OS counters synchronously, so every capture runs
//! on the blocking pool and the async task only keeps the cadence.

use crate::error::{BenchError, Result, SamplingError};
use crate::telemetry::TelemetrySource;
use crate::types::{Metric, MetricSample};
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Default sampling cadence.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(250);

/// Callback invoked with each freshly captured sample.
pub type SampleObserver = Box<dyn FnMut(&MetricSample) + Send>;

/// Captures telemetry at a fixed cadence.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSampler {
    interval: Duration,
}

impl Default for MetricsSampler {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

impl MetricsSampler {
    /// Create a sampler ticking every `interval`.
    pub fn new(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(BenchError::invalid_argument("sample interval must be non-zero"));
        }
        Ok(Self { interval })
    }

    /// The sampling cadence.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start sampling `source` on a new task. Must be called within a tokio
    /// runtime.
    pub fn start(&self, source: Box<dyn TelemetrySource>) -> SamplerHandle {
        self.start_with(source, CancellationToken::new(), None)
    }

    /// Start sampling, stopping when `stop` is cancelled or the handle is
    /// stopped, and passing every sample to `observer`.
    pub fn start_with(
        &self,
        source: Box<dyn TelemetrySource>,
        stop: CancellationToken,
        observer: Option<SampleObserver>,
    ) -> SamplerHandle {
        let interval = self.interval;
        let task_stop = stop.clone();
        let task = tokio::spawn(async move { sample_loop(source, interval, task_stop, observer).await });

        tracing::debug!(interval_ms = interval.as_millis() as u64, "Sampler started");
        SamplerHandle { stop, task }
    }
}

/// Handle to a running sampler.
#[derive(Debug)]
pub struct SamplerHandle {
    stop: CancellationToken,
    task: JoinHandle<Vec<MetricSample>>,
}

impl SamplerHandle {
    /// Stop sampling and return every captured sample, including a final
    /// sample taken at the moment of stopping.
    pub async fn stop(self) -> Vec<MetricSample> {
        self.stop.cancel();
        match self.task.await {
            Ok(samples) => {
                tracing::debug!(samples = samples.len(), "Sampler stopped");
                samples
            }
            Err(e) => {
                tracing::error!(error = %e, "Sampler task did not finish cleanly");
                Vec::new()
            }
        }
    }
}

async fn sample_loop(
    source: Box<dyn TelemetrySource>,
    interval: Duration,
    stop: CancellationToken,
    mut observer: Option<SampleObserver>,
) -> Vec<MetricSample> {
    let mut state = match tokio::task::spawn_blocking(move || SamplerState::new(source)).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Sampler could not read baseline counters");
            return Vec::new();
        }
    };
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                let Some(next) = capture_blocking(state, &mut observer).await else {
                    return Vec::new();
                };
                state = next;
            }
        }
    }

    capture_blocking(state, &mut observer)
        .await
        .map(|state| state.samples)
        .unwrap_or_default()
}

/// Take one sample on the blocking pool and record it.
///
/// A capture that panics is skipped. `None` means the blocking task itself
/// was lost (runtime shutdown) and the state went with it.
async fn capture_blocking(mut state: SamplerState, observer: &mut Option<SampleObserver>) -> Option<SamplerState> {
    let captured = tokio::task::spawn_blocking(move || {
        let sample = std::panic::catch_unwind(AssertUnwindSafe(|| state.capture()));
        (state, sample)
    })
    .await;

    let (mut state, sample) = match captured {
        Ok(captured) => captured,
        Err(e) => {
            tracing::error!(error = %e, "Telemetry task lost, sampling stopped");
            return None;
        }
    };
    match sample {
        Ok(sample) => {
            if let Some(observer) = observer.as_mut() {
                observer(&sample);
            }
            state.samples.push(sample);
        }
        Err(_) => tracing::error!("Telemetry capture panicked, sample skipped"),
    }
    Some(state)
}

/// Last cumulative counter reading and when it was taken.
type CounterReading = Option<(u64, Instant)>;

struct SamplerState {
    source: Box<dyn TelemetrySource>,
    origin: Instant,
    last_disk: CounterReading,
    last_network: CounterReading,
    reported: BTreeSet<Metric>,
    samples: Vec<MetricSample>,
}

impl SamplerState {
    fn new(mut source: Box<dyn TelemetrySource>) -> Self {
        let origin = Instant::now();
        let last_disk = source.disk_io_total_bytes().ok().map(|total| (total, origin));
        let last_network = source.network_io_total_bytes().ok().map(|total| (total, origin));
        Self {
            source,
            origin,
            last_disk,
            last_network,
            reported: BTreeSet::new(),
            samples: Vec::new(),
        }
    }

    fn capture(&mut self) -> MetricSample {
        let now = Instant::now();
        let offset = u64::try_from(now.duration_since(self.origin).as_nanos()).unwrap_or(u64::MAX);
        let mut sample = MetricSample::at(offset);

        let cpu = self.source.cpu_percent();
        sample.cpu_percent = self.absorb(Metric::CpuPercent, cpu);

        let memory = self.source.memory_used_bytes();
        sample.memory_used_bytes = self.absorb(Metric::MemoryUsedBytes, memory);

        let disk = self.source.disk_io_total_bytes();
        let disk = self.absorb(Metric::DiskIoBytesPerSec, disk);
        sample.disk_io_bytes_per_sec = counter_rate(&mut self.last_disk, disk, now);

        let network = self.source.network_io_total_bytes();
        let network = self.absorb(Metric::NetworkIoBytesPerSec, network);
        sample.network_io_bytes_per_sec = counter_rate(&mut self.last_network, network, now);

        let temperature = self.source.cpu_temperature_celsius();
        sample.cpu_temperature_celsius = self.absorb(Metric::CpuTemperatureCelsius, temperature);

        sample
    }

    /// Turn a per-metric error into an absent value, warning once per metric.
    fn absorb<T>(&mut self, metric: Metric, reading: std::result::Result<T, SamplingError>) -> Option<T> {
        match reading {
            Ok(value) => Some(value),
            Err(e) => {
                if self.reported.insert(metric) {
                    tracing::warn!(metric = %metric, error = %e, "Metric unavailable, omitting it from samples");
                } else {
                    tracing::debug!(metric = %metric, error = %e, "Metric read failed");
                }
                None
            }
        }
    }
}

/// Bytes per second between the previous reading and `current`.
///
/// The first successful reading only establishes a baseline. A counter that
/// went backwards (device reset) yields a rate of zero.
fn counter_rate(previous: &mut CounterReading, current: Option<u64>, now: Instant) -> Option<f64> {
    let current = current?;
    let (last, at) = previous.replace((current, now))?;
    let secs = now.duration_since(at).as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some(current.saturating_sub(last) as f64 / secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MockTelemetrySource;

    fn healthy_source() -> MockTelemetrySource {
        let mut source = MockTelemetrySource::new();
        source.expect_cpu_percent().returning(|| Ok(37.5));
        source.expect_memory_used_bytes().returning(|| Ok(1_048_576.0));
        let mut disk = 0u64;
        source.expect_disk_io_total_bytes().returning(move || {
            disk += 4_096;
            Ok(disk)
        });
        let mut net = 0u64;
        source.expect_network_io_total_bytes().returning(move || {
            net += 512;
            Ok(net)
        });
        source.expect_cpu_temperature_celsius().returning(|| Ok(48.0));
        source
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(MetricsSampler::new(Duration::ZERO).is_err());
        assert_eq!(MetricsSampler::default().interval(), DEFAULT_SAMPLE_INTERVAL);
    }

    #[tokio::test]
    async fn test_samples_at_cadence_until_stopped() {
        let sampler = MetricsSampler::new(Duration::from_millis(10)).unwrap();
        let handle = sampler.start(Box::new(healthy_source()));
        tokio::time::sleep(Duration::from_millis(80)).await;
        let samples = handle.stop().await;

        assert!(samples.len() >= 3, "got {} samples", samples.len());
        assert!(samples
            .windows(2)
            .all(|pair| pair[0].offset_nanos <= pair[1].offset_nanos));
        for sample in &samples {
            assert_eq!(sample.cpu_percent, Some(37.5));
            assert_eq!(sample.memory_used_bytes, Some(1_048_576.0));
            assert!(sample.disk_io_bytes_per_sec.unwrap() > 0.0);
            assert!(sample.network_io_bytes_per_sec.unwrap() > 0.0);
            assert_eq!(sample.cpu_temperature_celsius, Some(48.0));
        }
    }

    #[tokio::test]
    async fn test_stop_flushes_final_sample() {
        let sampler = MetricsSampler::new(Duration::from_secs(60)).unwrap();
        let handle = sampler.start(Box::new(healthy_source()));
        let samples = handle.stop().await;
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].cpu_percent, Some(37.5));
    }

    #[tokio::test]
    async fn test_failing_metrics_are_omitted() {
        let mut source = MockTelemetrySource::new();
        source
            .expect_cpu_percent()
            .returning(|| Err(SamplingError::Unavailable("cpu_percent")));
        source.expect_memory_used_bytes().returning(|| Ok(2_048.0));
        source.expect_disk_io_total_bytes().returning(|| {
            Err(SamplingError::Read {
                metric: "disk_io_bytes",
                reason: "permission denied".into(),
            })
        });
        source
            .expect_network_io_total_bytes()
            .returning(|| Err(SamplingError::Unavailable("network_io_bytes")));
        source
            .expect_cpu_temperature_celsius()
            .returning(|| Err(SamplingError::Unavailable("cpu_temperature_celsius")));

        let sampler = MetricsSampler::new(Duration::from_millis(5)).unwrap();
        let handle = sampler.start(Box::new(source));
        tokio::time::sleep(Duration::from_millis(30)).await;
        let samples = handle.stop().await;

        assert!(!samples.is_empty());
        for sample in &samples {
            assert_eq!(sample.cpu_percent, None);
            assert_eq!(sample.memory_used_bytes, Some(2_048.0));
            assert_eq!(sample.disk_io_bytes_per_sec, None);
            assert_eq!(sample.network_io_bytes_per_sec, None);
            assert_eq!(sample.cpu_temperature_celsius, None);
        }
    }

    #[tokio::test]
    async fn test_external_stop_token_ends_sampling() {
        let stop = CancellationToken::new();
        let sampler = MetricsSampler::new(Duration::from_millis(5)).unwrap();
        let seen = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = seen.clone();
        let handle = sampler.start_with(
            Box::new(healthy_source()),
            stop.clone(),
            Some(Box::new(move |_| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            })),
        );

        tokio::time::sleep(Duration::from_millis(25)).await;
        stop.cancel();
        let samples = handle.stop().await;
        assert_eq!(samples.len(), seen.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_slow_telemetry_does_not_stall_runtime() {
        let mut source = MockTelemetrySource::new();
        source.expect_cpu_percent().returning(|| {
            std::thread::sleep(Duration::from_millis(150));
            Ok(10.0)
        });
        source.expect_memory_used_bytes().returning(|| Ok(1.0));
        source.expect_disk_io_total_bytes().returning(|| Ok(0));
        source.expect_network_io_total_bytes().returning(|| Ok(0));
        source.expect_cpu_temperature_celsius().returning(|| Ok(50.0));

        let sampler = MetricsSampler::new(Duration::from_millis(1)).unwrap();
        let handle = sampler.start(Box::new(source));

        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_millis(120), "runtime stalled for {:?}", started.elapsed());

        let samples = handle.stop().await;
        assert!(samples.iter().all(|s| s.cpu_percent == Some(10.0)));
    }

    #[test]
    fn test_counter_rate() {
        let start = Instant::now();
        let mut previous = None;
        assert_eq!(counter_rate(&mut previous, Some(100), start), None);

        let later = start + Duration::from_millis(500);
        let rate = counter_rate(&mut previous, Some(600), later).unwrap();
        assert!((rate - 1_000.0).abs() < 1e-6);

        let reset = later + Duration::from_millis(500);
        assert_eq!(counter_rate(&mut previous, Some(10), reset), Some(0.0));
        assert_eq!(counter_rate(&mut previous, None, reset), None);
    }
}
