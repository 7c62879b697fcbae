use std::borrow::Cow;
use std::time::Instant;

use crate::cpu::reserve_host;
use crate::device::AdapterDescriptor;
use crate::error::{FillError, Result};
use crate::strategy::{AcceleratorFill, PhaseTimings};

/// Must match `@workgroup_size` in `shaders/fill.wgsl`.
const WORKGROUP_SIZE: u32 = 256;
const LANE_BYTES: u64 = std::mem::size_of::<i64>() as u64;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct FillParams {
    len: u32,
    lanes_per_row: u32,
    value_lo: u32,
    value_hi: u32,
}

impl FillParams {
    fn new(lanes: u32, grid: DispatchGrid, value: i64) -> Self {
        let bits = value as u64;
        Self {
            len: lanes,
            lanes_per_row: grid.lanes_per_row(),
            value_lo: bits as u32,
            value_hi: (bits >> 32) as u32,
        }
    }
}

/// Workgroup grid covering one chunk.
///
/// Spills into the y dimension once x would exceed the per-dimension limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchGrid {
    pub groups_x: u32,
    pub groups_y: u32,
}

impl DispatchGrid {
    pub fn for_lanes(lanes: u32, max_per_dimension: u32) -> Self {
        let groups = lanes.div_ceil(WORKGROUP_SIZE).max(1);
        let groups_x = groups.min(max_per_dimension.max(1));
        let groups_y = groups.div_ceil(groups_x);
        Self { groups_x, groups_y }
    }

    pub fn lanes_per_row(&self) -> u32 {
        self.groups_x.saturating_mul(WORKGROUP_SIZE)
    }

    pub fn total_lanes(&self) -> u64 {
        self.lanes_per_row() as u64 * self.groups_y as u64
    }
}

/// Largest number of lanes one storage binding can hold on this device.
pub fn chunk_lanes(limits: &wgpu::Limits) -> usize {
    let bytes = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    let lanes = (bytes / LANE_BYTES).min(u32::MAX as u64);
    (lanes as usize).max(1)
}

/// A wgpu device and queue bound to one adapter.
///
/// The device is destroyed when the context is dropped.
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    limits: wgpu::Limits,
    name: String,
}

impl GpuContext {
    /// Opens the adapter described by `descriptor`.
    pub fn acquire(descriptor: &AdapterDescriptor) -> Result<Self> {
        pollster::block_on(Self::acquire_async(descriptor))
    }

    async fn acquire_async(descriptor: &AdapterDescriptor) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Adapter order is stable within a process, but check the name anyway.
        let adapter = instance
            .enumerate_adapters(wgpu::Backends::all())
            .into_iter()
            .nth(descriptor.index)
            .filter(|a| a.get_info().name == descriptor.name)
            .ok_or(FillError::NoAdapter)?;

        let limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Fill Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
            log::error!("uncaptured wgpu error: {}", err);
        }));

        log::info!("acquired wgpu device {}", descriptor.name);
        Ok(Self {
            device,
            queue,
            limits,
            name: descriptor.name.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    /// Fills `len` lanes with `value` and blocks until the device is done.
    pub fn fill(&self, len: usize, value: i64, readback: bool) -> Result<AcceleratorFill> {
        pollster::block_on(self.fill_async(len, value, readback))
    }

    async fn fill_async(&self, len: usize, value: i64, readback: bool) -> Result<AcceleratorFill> {
        let mut phases = PhaseTimings::default();
        if len == 0 {
            return Ok(AcceleratorFill {
                output: readback.then(Vec::new),
                phases,
            });
        }

        let setup_start = Instant::now();
        let chunk = chunk_lanes(&self.limits).min(len);
        let chunk_bytes = chunk as u64 * LANE_BYTES;
        log::debug!(
            "{}: {} lanes in chunks of {} ({} bytes)",
            self.name,
            len,
            chunk,
            chunk_bytes
        );

        let mut host = if readback { Some(reserve_host(len)?) } else { None };

        // Allocate memory on the device
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let params_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fill Params Buffer"),
            size: std::mem::size_of::<FillParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fill Output Buffer"),
            size: chunk_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let staging_buffer = readback.then(|| {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Fill Staging Buffer"),
                size: chunk_bytes,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        let validation = self.device.pop_error_scope().await;
        let out_of_memory = self.device.pop_error_scope().await;
        if let Some(err) = out_of_memory.or(validation) {
            return Err(FillError::DeviceAllocation(err.to_string()));
        }

        // Load the kernel
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Fill Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("../shaders/fill.wgsl"))),
        });

        let bind_group_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Fill Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Fill Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let compute_pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Fill Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "main",
            cache: None,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Fill Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output_buffer.as_entire_binding(),
                },
            ],
        });

        if let Some(err) = self.device.pop_error_scope().await {
            return Err(FillError::Kernel(err.to_string()));
        }
        phases.setup = setup_start.elapsed();

        let mut offset = 0;
        while offset < len {
            let lanes = chunk.min(len - offset);
            let grid = DispatchGrid::for_lanes(lanes as u32, self.limits.max_compute_workgroups_per_dimension);
            let params = FillParams::new(lanes as u32, grid, value);
            let bytes = lanes as u64 * LANE_BYTES;

            // Tell the device to start computing the kernel
            let dispatch_start = Instant::now();
            self.queue.write_buffer(&params_buffer, 0, bytemuck::bytes_of(&params));

            let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Fill Command Encoder"),
            });
            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Fill Compute Pass"),
                    timestamp_writes: None,
                });
                compute_pass.set_pipeline(&compute_pipeline);
                compute_pass.set_bind_group(0, &bind_group, &[]);
                compute_pass.dispatch_workgroups(grid.groups_x, grid.groups_y, 1);
            }
            if let Some(staging) = &staging_buffer {
                encoder.copy_buffer_to_buffer(&output_buffer, 0, staging, 0, bytes);
            }
            self.queue.submit(Some(encoder.finish()));
            phases.dispatch += dispatch_start.elapsed();

            // Wait for the device to finish this chunk
            let sync_start = Instant::now();
            match (&staging_buffer, host.as_mut()) {
                (Some(staging), Some(host)) => self.read_chunk(staging, bytes, host).await?,
                _ => {
                    self.device.poll(wgpu::Maintain::Wait);
                }
            }
            phases.synchronize += sync_start.elapsed();

            offset += lanes;
        }

        Ok(AcceleratorFill { output: host, phases })
    }

    async fn read_chunk(&self, staging: &wgpu::Buffer, bytes: u64, host: &mut Vec<i64>) -> Result<()> {
        let slice = staging.slice(..bytes);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        match receiver.receive().await {
            Some(Ok(())) => {
                {
                    let data = slice.get_mapped_range();
                    host.extend_from_slice(bytemuck::cast_slice::<u8, i64>(&data));
                }
                staging.unmap();
                Ok(())
            }
            Some(Err(e)) => Err(FillError::BufferMap(e.to_string())),
            None => Err(FillError::BufferMap("map callback was dropped".to_string())),
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        self.device.destroy();
        log::debug!("released wgpu device {}", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_fits_small_chunk_in_one_row() {
        let grid = DispatchGrid::for_lanes(1000, 65535);
        assert_eq!(grid, DispatchGrid { groups_x: 4, groups_y: 1 });
        assert!(grid.total_lanes() >= 1000);
    }

    #[test]
    fn grid_spills_into_second_dimension() {
        let lanes = 65535 * WORKGROUP_SIZE + 1;
        let grid = DispatchGrid::for_lanes(lanes, 65535);
        assert_eq!(grid.groups_x, 65535);
        assert_eq!(grid.groups_y, 2);
        assert!(grid.total_lanes() >= lanes as u64);
    }

    #[test]
    fn grid_never_empty() {
        let grid = DispatchGrid::for_lanes(0, 65535);
        assert_eq!(grid, DispatchGrid { groups_x: 1, groups_y: 1 });
    }

    #[test]
    fn chunk_respects_binding_limit() {
        let limits = wgpu::Limits::default();
        let lanes = chunk_lanes(&limits);
        assert_eq!(lanes as u64 * LANE_BYTES, limits.max_storage_buffer_binding_size as u64);
    }

    #[test]
    fn params_split_value_into_words() {
        let grid = DispatchGrid::for_lanes(10, 65535);
        let params = FillParams::new(10, grid, 3125);
        assert_eq!(params.value_lo, 3125);
        assert_eq!(params.value_hi, 0);

        let params = FillParams::new(10, grid, -1);
        assert_eq!(params.value_lo, u32::MAX);
        assert_eq!(params.value_hi, u32::MAX);
    }

    #[test]
    fn params_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<FillParams>(), 16);
    }
}
