//! Runner - executes built artifacts on the target device with
//! noise-resistant timing, exclusive device ownership, and a hard timeout.

use crate::builder::Artifact;
use crate::result::{FailureKind, MeasureResult};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// Timing parameters for one measurement.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Number of repetition batches; one latency sample per batch.
    pub repeat: usize,
    /// Initial invocations per batch. Grows until a batch covers
    /// `min_repeat_ms`.
    pub number: usize,
    /// Minimum wall time per batch. Batches shorter than this re-run with a
    /// doubled `number` so timer resolution does not dominate the sample.
    pub min_repeat_ms: u64,
    /// Hard per-trial budget, enforced even if the artifact never returns.
    pub timeout: Duration,
    /// Flush cache state before each repetition so a warm second run is not
    /// favored.
    pub flush_cache: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            repeat: 3,
            number: 4,
            min_repeat_ms: 20,
            timeout: Duration::from_secs(10),
            flush_cache: false,
        }
    }
}

/// One target device. At most one measurement executes on it at a time.
#[derive(Debug)]
pub struct Device {
    pub name: String,
    lock: Mutex<()>,
}

/// One or a small fixed pool of identical devices.
#[derive(Debug, Clone)]
pub struct DevicePool {
    devices: Vec<Arc<Device>>,
}

impl DevicePool {
    pub fn single(name: &str) -> Self {
        Self::new(&[name])
    }

    pub fn new(names: &[&str]) -> Self {
        assert!(!names.is_empty(), "device pool needs at least one device");
        Self {
            devices: names
                .iter()
                .map(|n| {
                    Arc::new(Device {
                        name: n.to_string(),
                        lock: Mutex::new(()),
                    })
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Acquire exclusive ownership of a device: first idle one, else block
    /// on the first. The guard releases on drop, on every exit path.
    fn acquire(&self) -> (Arc<Device>, MutexGuard<'_, ()>) {
        for device in &self.devices {
            if let Ok(guard) = device.lock.try_lock() {
                return (Arc::clone(device), guard);
            }
        }
        let device = &self.devices[0];
        let guard = device.lock.lock().unwrap_or_else(|e| e.into_inner());
        (Arc::clone(device), guard)
    }
}

/// Executes artifacts and turns raw timings into per-batch mean latencies.
pub struct Runner {
    opts: RunOptions,
    pool: DevicePool,
}

impl Runner {
    pub fn new(pool: DevicePool, opts: RunOptions) -> Self {
        Self { opts, pool }
    }

    pub fn options(&self) -> &RunOptions {
        &self.opts
    }

    /// Time one artifact. Holds a device for the duration; the measurement
    /// itself happens on a worker thread so an artifact that never returns
    /// is abandoned at the timeout instead of blocking the session.
    pub fn run(&self, artifact: Artifact) -> MeasureResult {
        let (device, _guard) = self.pool.acquire();
        tracing::debug!(device = %device.name, "device acquired");

        let opts = self.opts.clone();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            // Receiver may be gone if the runner already timed out.
            let _ = tx.send(measure_on_thread(artifact, &opts));
        });

        match rx.recv_timeout(self.opts.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => MeasureResult::failure(
                FailureKind::Timeout,
                format!("run exceeded {:?} budget", self.opts.timeout),
            ),
            Err(mpsc::RecvTimeoutError::Disconnected) => MeasureResult::failure(
                FailureKind::RuntimeFault,
                "measurement thread died before reporting",
            ),
        }
    }
}

fn measure_on_thread(artifact: Artifact, opts: &RunOptions) -> MeasureResult {
    let exe = artifact.executable();
    let min_repeat = Duration::from_millis(opts.min_repeat_ms);
    let mut number = opts.number.max(1);
    let mut samples = Vec::with_capacity(opts.repeat);

    for _ in 0..opts.repeat.max(1) {
        if opts.flush_cache {
            exe.flush_cache();
        }
        // Grow `number` until the batch covers the minimum window, then keep
        // the final batch as the sample. Handles devices where one call is
        // below timer resolution.
        let elapsed = loop {
            match exe.execute(number) {
                Ok(elapsed) if elapsed < min_repeat => {
                    number = number.saturating_mul(2);
                }
                Ok(elapsed) => break elapsed,
                Err(detail) => {
                    return MeasureResult::failure(FailureKind::RuntimeFault, detail);
                }
            }
        };
        samples.push(elapsed.as_secs_f64() / number as f64);
    }

    MeasureResult::success(samples)
}
