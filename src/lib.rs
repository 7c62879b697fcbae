//! Times filling a large `i64` buffer with a constant on the host CPU
//! (one thread and the rayon pool) and on GPUs through wgpu and CUDA.

pub mod config;
pub mod cpu;
#[cfg(feature = "cuda")]
pub mod cuda;
pub mod device;
pub mod error;
pub mod gpu;
pub mod report;
pub mod runner;
pub mod strategy;
pub mod utils;

pub use config::{BenchConfig, FILL_VALUE, LENGTH};
pub use device::{enumerate_devices, Device, DeviceKind, DeviceSet};
pub use error::{FillError, Result};
pub use report::Reporter;
pub use runner::{BenchmarkRunner, DeviceProbe, FixedProbe, Row, SystemProbe};
pub use strategy::{Measurement, Strategy};
