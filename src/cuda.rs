//! CUDA fill kernel using cudarc 0.17

use std::sync::Arc;
use std::time::Instant;

use cudarc::driver::{CudaContext, CudaStream, LaunchConfig, PushKernelArg};
use cudarc::nvrtc::compile_ptx;

use crate::cpu::alloc_host;
use crate::device::CudaDescriptor;
use crate::error::{FillError, Result};
use crate::strategy::{AcceleratorFill, PhaseTimings};

/// Grid-stride loop, so a capped grid still covers every lane.
const FILL_KERNEL_SRC: &str = r#"
extern "C" __global__ void fill_i64(long long *out, unsigned long long n, long long value) {
    unsigned long long stride = (unsigned long long)blockDim.x * gridDim.x;
    for (unsigned long long i = (unsigned long long)blockIdx.x * blockDim.x + threadIdx.x; i < n; i += stride) {
        out[i] = value;
    }
}
"#;

const BLOCK_SIZE: u32 = 256;
const MAX_BLOCKS: u32 = 1 << 20;

/// Number of CUDA devices the driver reports.
pub fn device_count() -> Result<usize> {
    let count = CudaContext::device_count().map_err(|e| FillError::Cuda(format!("{:?}", e)))?;
    Ok(count.max(0) as usize)
}

/// Launch geometry for `len` lanes.
pub fn launch_config(len: u64) -> LaunchConfig {
    let blocks = len.div_ceil(BLOCK_SIZE as u64).clamp(1, MAX_BLOCKS as u64) as u32;
    LaunchConfig {
        grid_dim: (blocks, 1, 1),
        block_dim: (BLOCK_SIZE, 1, 1),
        shared_mem_bytes: 0,
    }
}

/// A CUDA context and its default stream.
///
/// The context is released when the session is dropped.
pub struct CudaSession {
    ctx: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    ordinal: usize,
}

impl CudaSession {
    pub fn acquire(descriptor: &CudaDescriptor) -> Result<Self> {
        let ctx = CudaContext::new(descriptor.ordinal).map_err(|e| {
            FillError::DeviceUnavailable(format!(
                "CUDA context for device {}: {:?}",
                descriptor.ordinal, e
            ))
        })?;
        let stream = ctx.default_stream();
        log::info!("acquired CUDA device {}", descriptor.ordinal);
        Ok(Self {
            ctx,
            stream,
            ordinal: descriptor.ordinal,
        })
    }

    /// Fills `len` lanes with `value` and blocks until the stream is idle.
    pub fn fill(&self, len: usize, value: i64, readback: bool) -> Result<AcceleratorFill> {
        let mut phases = PhaseTimings::default();
        if len == 0 {
            return Ok(AcceleratorFill {
                output: readback.then(Vec::new),
                phases,
            });
        }

        let setup_start = Instant::now();
        let mut output = self
            .stream
            .alloc_zeros::<i64>(len)
            .map_err(|e| FillError::DeviceAllocation(format!("{:?}", e)))?;

        let ptx = compile_ptx(FILL_KERNEL_SRC).map_err(|e| FillError::Kernel(format!("{:?}", e)))?;
        let module = self
            .ctx
            .load_module(ptx)
            .map_err(|e| FillError::Kernel(format!("{:?}", e)))?;
        let function = module
            .load_function("fill_i64")
            .map_err(|e| FillError::Kernel(format!("{:?}", e)))?;
        phases.setup = setup_start.elapsed();

        let dispatch_start = Instant::now();
        let n = len as u64;
        let mut builder = self.stream.launch_builder(&function);
        builder.arg(&mut output);
        builder.arg(&n);
        builder.arg(&value);
        unsafe { builder.launch(launch_config(n)) }
            .map_err(|e| FillError::Dispatch(format!("{:?}", e)))?;
        phases.dispatch = dispatch_start.elapsed();

        let sync_start = Instant::now();
        self.stream
            .synchronize()
            .map_err(|e| FillError::Cuda(format!("{:?}", e)))?;
        let host = if readback {
            let mut host = alloc_host(len)?;
            self.stream
                .memcpy_dtoh(&output, &mut host)
                .map_err(|e| FillError::Cuda(format!("{:?}", e)))?;
            Some(host)
        } else {
            None
        };
        phases.synchronize = sync_start.elapsed();

        Ok(AcceleratorFill { output: host, phases })
    }
}

impl Drop for CudaSession {
    fn drop(&mut self) {
        log::debug!("released CUDA device {}", self.ordinal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_covers_small_lengths() {
        let cfg = launch_config(1000);
        assert_eq!(cfg.grid_dim, (4, 1, 1));
        assert_eq!(cfg.block_dim, (BLOCK_SIZE, 1, 1));
    }

    #[test]
    fn launch_grid_is_capped() {
        let cfg = launch_config(2_146_435_071);
        assert_eq!(cfg.grid_dim.0, MAX_BLOCKS);
    }
}
