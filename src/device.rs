//! Device enumeration.
//!
//! Discovers which compute backends can run a fill in this process. The CPU
//! is always present; wgpu adapters and CUDA ordinals are added when their
//! runtimes answer. A runtime that fails to answer (or panics while loading
//! its driver library) is simply absent from the result.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Payload-free tag for a kind of compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceKind {
    /// Host CPU, always available.
    Cpu,
    /// Portable GPU backend through wgpu (Vulkan/Metal/DX12/GL).
    Portable,
    /// NVIDIA GPU through the CUDA driver.
    Cuda,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "CPU"),
            Self::Portable => write!(f, "Portable"),
            Self::Cuda => write!(f, "CUDA"),
        }
    }
}

/// A wgpu adapter as seen at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterDescriptor {
    /// Position in `Instance::enumerate_adapters` order.
    pub index: usize,
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub max_buffer_size: u64,
}

/// A CUDA device ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CudaDescriptor {
    pub ordinal: usize,
}

/// A compute device together with what the fill needs to know about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Device {
    Cpu { threads: usize },
    Portable(AdapterDescriptor),
    Cuda(CudaDescriptor),
}

impl Device {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Cpu { .. } => DeviceKind::Cpu,
            Self::Portable(_) => DeviceKind::Portable,
            Self::Cuda(_) => DeviceKind::Cuda,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu { threads } => write!(f, "CPU[threads: {}]", threads),
            Self::Portable(a) => write!(
                f,
                "{}[Type: {:?}, Backend: {:?}, MaxBuffer: {}]",
                a.name, a.device_type, a.backend, a.max_buffer_size
            ),
            Self::Cuda(c) => write!(f, "CUDA[ordinal: {}]", c.ordinal),
        }
    }
}

/// The devices found by one enumeration, in preference order per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSet {
    devices: Vec<Device>,
}

impl DeviceSet {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }

    /// A set holding only the host CPU.
    pub fn cpu_only() -> Self {
        Self::new(vec![cpu_device()])
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Distinct kinds present, sorted.
    pub fn kinds(&self) -> Vec<DeviceKind> {
        let mut kinds: Vec<DeviceKind> = self.devices.iter().map(Device::kind).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    pub fn contains(&self, kind: DeviceKind) -> bool {
        self.devices.iter().any(|d| d.kind() == kind)
    }

    /// The preferred device of `kind`, if any.
    pub fn first(&self, kind: DeviceKind) -> Option<&Device> {
        self.devices.iter().find(|d| d.kind() == kind)
    }
}

fn cpu_device() -> Device {
    Device::Cpu {
        threads: rayon::current_num_threads(),
    }
}

fn type_rank(dt: wgpu::DeviceType) -> u32 {
    match dt {
        wgpu::DeviceType::DiscreteGpu => 4,
        wgpu::DeviceType::IntegratedGpu => 3,
        wgpu::DeviceType::VirtualGpu => 2,
        wgpu::DeviceType::Cpu => 1,
        _ => 0,
    }
}

/// All wgpu adapters, hardware first.
pub fn probe_adapters() -> Vec<AdapterDescriptor> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let mut adapters: Vec<AdapterDescriptor> = instance
        .enumerate_adapters(wgpu::Backends::all())
        .iter()
        .enumerate()
        .filter_map(|(index, adapter)| {
            let info = adapter.get_info();
            let flags = adapter.get_downlevel_capabilities().flags;
            if !flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
                log::debug!("skipping {}: no compute shaders", info.name);
                return None;
            }
            Some(AdapterDescriptor {
                index,
                name: info.name,
                backend: info.backend,
                device_type: info.device_type,
                max_buffer_size: adapter.limits().max_buffer_size,
            })
        })
        .collect();

    // Stable, so enumeration order breaks ties.
    adapters.sort_by_key(|a| std::cmp::Reverse(type_rank(a.device_type)));
    adapters
}

cfg_if::cfg_if! {
    if #[cfg(feature = "cuda")] {
        /// CUDA ordinals reported by the driver.
        pub fn probe_cuda() -> Vec<CudaDescriptor> {
            match crate::cuda::device_count() {
                Ok(count) => (0..count).map(|ordinal| CudaDescriptor { ordinal }).collect(),
                Err(e) => {
                    log::debug!("CUDA probe failed: {}", e);
                    Vec::new()
                }
            }
        }
    } else {
        /// Always empty: built without the `cuda` feature.
        pub fn probe_cuda() -> Vec<CudaDescriptor> {
            log::debug!("CUDA support not compiled in");
            Vec::new()
        }
    }
}

/// Runs a probe, treating a panic as "nothing found".
fn guarded<T>(what: &str, probe: impl FnOnce() -> Vec<T>) -> Vec<T> {
    match panic::catch_unwind(AssertUnwindSafe(probe)) {
        Ok(found) => found,
        Err(_) => {
            log::debug!("{} probe panicked; treating backend as absent", what);
            Vec::new()
        }
    }
}

/// Enumerates every device usable in the current process.
pub fn enumerate_devices() -> DeviceSet {
    let mut devices = vec![cpu_device()];
    devices.extend(guarded("wgpu", probe_adapters).into_iter().map(Device::Portable));
    devices.extend(guarded("CUDA", probe_cuda).into_iter().map(Device::Cuda));

    for device in &devices {
        log::debug!("found device {}", device);
    }
    DeviceSet::new(devices)
}
