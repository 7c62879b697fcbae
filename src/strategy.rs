//! The four fill strategies behind one `run` entry point.

use std::fmt;
use std::time::{Duration, Instant};

use crate::config::BenchConfig;
use crate::cpu;
use crate::device::{Device, DeviceKind};
use crate::error::{FillError, Result};
use crate::gpu::GpuContext;

/// Time spent in each stage of an accelerator fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    /// Buffer allocation and kernel load.
    pub setup: Duration,
    pub dispatch: Duration,
    /// Waiting for the device, including read-back.
    pub synchronize: Duration,
}

impl fmt::Display for PhaseTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "setup {:?}, dispatch {:?}, synchronize {:?}",
            self.setup, self.dispatch, self.synchronize
        )
    }
}

/// Result of one accelerator fill.
#[derive(Debug, Default)]
pub struct AcceleratorFill {
    /// Host copy of the device buffer, when read-back was requested.
    pub output: Option<Vec<i64>>,
    pub phases: PhaseTimings,
}

/// Outcome of one strategy for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Measurement {
    Elapsed(Duration),
    /// The strategy's device kind was not enumerated; it never ran.
    Unavailable,
    /// The strategy ran and failed; holds the error text.
    Failed(String),
}

impl Measurement {
    /// Whole elapsed milliseconds, truncated.
    pub fn millis(&self) -> Option<u128> {
        match self {
            Self::Elapsed(d) => Some(d.as_millis()),
            _ => None,
        }
    }
}

/// A fill strategy, in table column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Sequential,
    Parallel,
    Portable,
    Cuda,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Sequential,
        Strategy::Parallel,
        Strategy::Portable,
        Strategy::Cuda,
    ];

    /// Column header.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sequential => "SingleThread",
            Self::Parallel => "TPL",
            Self::Portable => "CLA",
            Self::Cuda => "CUDA",
        }
    }

    /// The device kind this strategy needs.
    pub fn device_kind(&self) -> DeviceKind {
        match self {
            Self::Sequential | Self::Parallel => DeviceKind::Cpu,
            Self::Portable => DeviceKind::Portable,
            Self::Cuda => DeviceKind::Cuda,
        }
    }

    /// Runs the fill for one length and returns the elapsed time.
    ///
    /// For accelerators the context is acquired before the clock starts and
    /// released before returning. The filled buffer is dropped.
    pub fn run(&self, device: &Device, len: usize, config: &BenchConfig) -> Result<Duration> {
        match (self, device) {
            (Self::Sequential, Device::Cpu { .. }) => {
                let start = Instant::now();
                let output = cpu::fill_sequential(len, config.value)?;
                let elapsed = start.elapsed();
                drop(output);
                Ok(elapsed)
            }
            (Self::Parallel, Device::Cpu { .. }) => {
                let start = Instant::now();
                let output = cpu::fill_parallel(len, config.value)?;
                let elapsed = start.elapsed();
                drop(output);
                Ok(elapsed)
            }
            (Self::Portable, Device::Portable(adapter)) => {
                let init_start = Instant::now();
                let context = GpuContext::acquire(adapter)?;
                log::debug!("{}: context init {:?}", self.label(), init_start.elapsed());

                let start = Instant::now();
                let fill = context.fill(len, config.value, config.readback)?;
                let elapsed = start.elapsed();
                log::debug!("{}: {}", self.label(), fill.phases);
                Ok(elapsed)
            }
            (Self::Cuda, Device::Cuda(descriptor)) => run_cuda(self, descriptor, len, config),
            (_, other) => Err(FillError::DeviceUnavailable(format!(
                "{} cannot run on {}",
                self.label(),
                other
            ))),
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "cuda")] {
        fn run_cuda(
            strategy: &Strategy,
            descriptor: &crate::device::CudaDescriptor,
            len: usize,
            config: &BenchConfig,
        ) -> Result<Duration> {
            let init_start = Instant::now();
            let session = crate::cuda::CudaSession::acquire(descriptor)?;
            log::debug!("{}: context init {:?}", strategy.label(), init_start.elapsed());

            let start = Instant::now();
            let fill = session.fill(len, config.value, config.readback)?;
            let elapsed = start.elapsed();
            log::debug!("{}: {}", strategy.label(), fill.phases);
            Ok(elapsed)
        }
    } else {
        fn run_cuda(
            strategy: &Strategy,
            _descriptor: &crate::device::CudaDescriptor,
            _len: usize,
            _config: &BenchConfig,
        ) -> Result<Duration> {
            Err(FillError::DeviceUnavailable(format!(
                "{} support not compiled in",
                strategy.label()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::CudaDescriptor;

    #[test]
    fn labels_follow_column_order() {
        let labels: Vec<&str> = Strategy::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(labels, vec!["SingleThread", "TPL", "CLA", "CUDA"]);
    }

    #[test]
    fn cpu_strategies_need_cpu() {
        assert_eq!(Strategy::Sequential.device_kind(), DeviceKind::Cpu);
        assert_eq!(Strategy::Parallel.device_kind(), DeviceKind::Cpu);
        assert_eq!(Strategy::Portable.device_kind(), DeviceKind::Portable);
        assert_eq!(Strategy::Cuda.device_kind(), DeviceKind::Cuda);
    }

    #[test]
    fn cpu_strategies_run_on_cpu() {
        let cpu = Device::Cpu { threads: 2 };
        let config = BenchConfig::with_length(1000);
        assert!(Strategy::Sequential.run(&cpu, 1000, &config).is_ok());
        assert!(Strategy::Parallel.run(&cpu, 1000, &config).is_ok());
    }

    #[test]
    fn mismatched_device_is_rejected() {
        let cpu = Device::Cpu { threads: 2 };
        let config = BenchConfig::with_length(10);
        let err = Strategy::Cuda.run(&cpu, 10, &config).unwrap_err();
        assert!(matches!(err, FillError::DeviceUnavailable(_)));

        let cuda = Device::Cuda(CudaDescriptor { ordinal: 0 });
        assert!(Strategy::Sequential.run(&cuda, 10, &config).is_err());
    }

    #[test]
    fn millis_only_for_elapsed() {
        assert_eq!(Measurement::Elapsed(Duration::from_millis(1500)).millis(), Some(1500));
        assert_eq!(Measurement::Unavailable.millis(), None);
        assert_eq!(Measurement::Failed("x".into()).millis(), None);
    }
}
