//! wgpu backend for the dense complex kernels of the atoll engine.
//!
//! Implements [`DenseOps`] with an f64 WGSL matmul so the force hot path
//! can offload its `nx×nx` complex products. Results agree with the CPU
//! backend up to floating-point rounding; devices without `SHADER_F64`
//! are rejected at construction instead of silently degrading precision.
//! The LU-based inverse stays on the CPU (the trait default), where
//! pivoting at these block sizes is already optimal.

mod shaders;

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use atoll_math::{CDMat, DenseOps, CD};

/// Error type for GPU backend construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpuError {
    /// No compatible adapter was found.
    #[error("no GPU adapter found")]
    NoAdapter,

    /// The adapter cannot run f64 shaders; a backend on it would not be
    /// result-identical to the CPU.
    #[error("GPU adapter does not support SHADER_F64")]
    NoF64Support,

    /// Device creation failed.
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(String),
}

/// Dense complex kernels on a wgpu device.
pub struct GpuOps {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl GpuOps {
    /// Acquire a device with f64 shader support and compile the kernels.
    pub fn new() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(GpuError::NoAdapter)?;

        if !adapter.features().contains(wgpu::Features::SHADER_F64) {
            return Err(GpuError::NoF64Support);
        }

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("atoll-dense-device"),
                required_features: wgpu::Features::SHADER_F64,
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| GpuError::DeviceRequest(e.to_string()))?;

        info!(adapter = %adapter.get_info().name, "dense kernels on GPU");

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("zgemm_bgl"),
                entries: &[
                    buffer_entry(0, wgpu::BufferBindingType::Uniform),
                    buffer_entry(1, wgpu::BufferBindingType::Storage { read_only: true }),
                    buffer_entry(2, wgpu::BufferBindingType::Storage { read_only: true }),
                    buffer_entry(3, wgpu::BufferBindingType::Storage { read_only: false }),
                ],
            });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("zgemm"),
            source: wgpu::ShaderSource::Wgsl(shaders::ZGEMM_F64.into()),
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("zgemm"),
            layout: Some(
                &device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("zgemm_layout"),
                    bind_group_layouts: &[&bind_group_layout],
                    push_constant_ranges: &[],
                }),
            ),
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            pipeline,
            bind_group_layout,
        })
    }
}

fn buffer_entry(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bind(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

/// Flatten a column-major complex matrix into interleaved doubles.
fn interleave(m: &CDMat) -> Vec<f64> {
    let mut out = Vec::with_capacity(2 * m.len());
    for z in m.iter() {
        out.push(z.re);
        out.push(z.im);
    }
    out
}

impl GpuOps {
    fn upload(&self, label: &str, data: &[f64]) -> wgpu::Buffer {
        let buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (data.len() * 8).max(8) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue.write_buffer(&buf, 0, bytemuck::cast_slice(data));
        buf
    }
}

impl DenseOps for GpuOps {
    /// Dense complex product on the device.
    ///
    /// Buffers are created per call and released afterwards. A failed
    /// readback aborts: there is no meaningful partial result to return.
    fn matmul(&self, a: &CDMat, b: &CDMat) -> CDMat {
        assert_eq!(a.ncols(), b.nrows(), "inner dimension mismatch");
        let (m, k, n) = (a.nrows(), a.ncols(), b.ncols());

        let dims: [u32; 4] = [m as u32, k as u32, n as u32, 0];
        let dims_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("zgemm_dims"),
            size: 16,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue
            .write_buffer(&dims_buf, 0, bytemuck::cast_slice(&dims));

        let a_buf = self.upload("zgemm_a", &interleave(a));
        let b_buf = self.upload("zgemm_b", &interleave(b));

        let c_bytes = (2 * m * n * 8).max(8) as u64;
        let c_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("zgemm_c"),
            size: c_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("zgemm_staging"),
            size: c_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("zgemm_bind"),
            layout: &self.bind_group_layout,
            entries: &[
                bind(0, &dims_buf),
                bind(1, &a_buf),
                bind(2, &b_buf),
                bind(3, &c_buf),
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("zgemm_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("zgemm_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                (m as u32).div_ceil(16),
                (n as u32).div_ceil(16),
                1,
            );
        }
        encoder.copy_buffer_to_buffer(&c_buf, 0, &staging, 0, c_bytes);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .expect("GPU readback channel closed")
            .expect("GPU buffer mapping failed");

        let data = slice.get_mapped_range();
        let doubles: &[f64] = bytemuck::cast_slice(&data);
        let out = CDMat::from_fn(m, n, |i, j| {
            let idx = 2 * (j * m + i);
            CD::new(doubles[idx], doubles[idx + 1])
        });
        drop(data);
        staging.unmap();
        out
    }
}
