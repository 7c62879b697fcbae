//! Benchmark runner: enumerates devices, runs each strategy once per length,
//! and contains failures to the column that raised them.

use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};

use crate::config::BenchConfig;
use crate::device::{self, DeviceSet};
use crate::error::FillError;
use crate::report::Reporter;
use crate::strategy::{Measurement, Strategy};

/// Source of the device set for each row.
pub trait DeviceProbe {
    fn enumerate(&self) -> DeviceSet;
}

/// Probes the real runtimes in this process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl DeviceProbe for SystemProbe {
    fn enumerate(&self) -> DeviceSet {
        device::enumerate_devices()
    }
}

/// A fixed device set, for environments where probing is not wanted.
#[derive(Debug, Clone, Default)]
pub struct FixedProbe(pub DeviceSet);

impl DeviceProbe for FixedProbe {
    fn enumerate(&self) -> DeviceSet {
        self.0.clone()
    }
}

/// One table row: the element count and one measurement per strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub length: usize,
    pub cells: Vec<(Strategy, Measurement)>,
}

impl Row {
    pub fn measurement(&self, strategy: Strategy) -> Option<&Measurement> {
        self.cells
            .iter()
            .find(|(s, _)| *s == strategy)
            .map(|(_, m)| m)
    }
}

pub struct BenchmarkRunner<P: DeviceProbe> {
    config: BenchConfig,
    probe: P,
}

impl<P: DeviceProbe> BenchmarkRunner<P> {
    pub fn new(config: BenchConfig, probe: P) -> Self {
        Self { config, probe }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Measures every strategy for one length.
    pub fn run_row(&self, length: usize) -> Row {
        let devices = self.probe.enumerate();
        log::debug!("device kinds for {}: {:?}", length, devices.kinds());

        let cells = Strategy::ALL
            .iter()
            .map(|&strategy| (strategy, self.measure(strategy, &devices, length)))
            .collect();
        Row { length, cells }
    }

    /// Runs one strategy if its device kind is present, never letting an
    /// error or panic escape.
    pub fn measure(&self, strategy: Strategy, devices: &DeviceSet, length: usize) -> Measurement {
        let Some(device) = devices.first(strategy.device_kind()) else {
            return Measurement::Unavailable;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| strategy.run(device, length, &self.config)))
            .unwrap_or_else(|payload| Err(FillError::from_panic(payload)));

        match outcome {
            Ok(elapsed) => {
                log::info!("{} filled {} elements in {:?}", strategy.label(), length, elapsed);
                Measurement::Elapsed(elapsed)
            }
            Err(e) => {
                log::warn!("{} failed for {} elements: {}", strategy.label(), length, e);
                Measurement::Failed(e.to_string())
            }
        }
    }

    /// Runs every configured length, writing the header once and one row each.
    pub fn run<W: Write>(&self, reporter: &mut Reporter<W>) -> io::Result<Vec<Row>> {
        reporter.write_header()?;
        let mut rows = Vec::with_capacity(self.config.lengths.len());
        for &length in &self.config.lengths {
            let row = self.run_row(length);
            reporter.write_row(&row)?;
            rows.push(row);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CudaDescriptor, Device};

    #[test]
    fn absent_kinds_are_unavailable() {
        let runner = BenchmarkRunner::new(BenchConfig::with_length(100), FixedProbe(DeviceSet::cpu_only()));
        let row = runner.run_row(100);
        assert_eq!(row.measurement(Strategy::Portable), Some(&Measurement::Unavailable));
        assert_eq!(row.measurement(Strategy::Cuda), Some(&Measurement::Unavailable));
        assert!(matches!(row.measurement(Strategy::Sequential), Some(Measurement::Elapsed(_))));
        assert!(matches!(row.measurement(Strategy::Parallel), Some(Measurement::Elapsed(_))));
    }

    #[test]
    fn cells_follow_column_order() {
        let runner = BenchmarkRunner::new(BenchConfig::with_length(0), FixedProbe(DeviceSet::cpu_only()));
        let row = runner.run_row(0);
        let order: Vec<Strategy> = row.cells.iter().map(|(s, _)| *s).collect();
        assert_eq!(order, Strategy::ALL.to_vec());
    }

    #[test]
    fn host_allocation_failure_stays_in_its_column() {
        let runner = BenchmarkRunner::new(BenchConfig::with_length(usize::MAX), FixedProbe(DeviceSet::cpu_only()));
        let row = runner.run_row(usize::MAX);
        assert!(matches!(row.measurement(Strategy::Sequential), Some(Measurement::Failed(_))));
        assert!(matches!(row.measurement(Strategy::Parallel), Some(Measurement::Failed(_))));
        assert_eq!(row.measurement(Strategy::Cuda), Some(&Measurement::Unavailable));
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn cuda_without_support_fails_without_aborting() {
        let devices = DeviceSet::new(vec![
            Device::Cpu { threads: 1 },
            Device::Cuda(CudaDescriptor { ordinal: 0 }),
        ]);
        let runner = BenchmarkRunner::new(BenchConfig::with_length(10), FixedProbe(devices.clone()));
        let measurement = runner.measure(Strategy::Cuda, &devices, 10);
        assert!(matches!(measurement, Measurement::Failed(_)));
        assert!(matches!(runner.measure(Strategy::Sequential, &devices, 10), Measurement::Elapsed(_)));
    }
}
