//! GPU implementation of [`ComputeBackend`] built on [`wgpu`].
//!
//! The `WgpuBackend` compiles the WGSL shaders once per kernel and dispatches
//! them on the system's graphics device. Results are copied into staging
//! buffers and mapped back before `dispatch` returns, so callers see the same
//! contract as with the CPU backend. Initialization fails if no compatible
//! adapter is found.

use crate::layout::{binding_count, is_output, is_uniform};
use crate::{BufferView, ComputeBackend, ComputeError, Kernel};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Smallest buffer the backend creates. Runtime-sized arrays may not be bound
/// to empty buffers.
const MIN_BUFFER_SIZE: usize = 256;

struct CachedPipeline {
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

/// GPU-backed implementation of [`ComputeBackend`] built on `wgpu`.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipelines: Mutex<HashMap<Kernel, Arc<CachedPipeline>>>,
}

impl WgpuBackend {
    /// Creates a new backend using the system's default high-performance GPU.
    ///
    /// # Errors
    ///
    /// Returns `ComputeError::BackendUnavailable` if no adapter or device can
    /// be acquired.
    pub fn new() -> Result<Self, ComputeError> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .ok_or(ComputeError::BackendUnavailable)?;
        tracing::debug!(adapter = ?adapter.get_info(), "selected wgpu adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("tilemarch-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))
        .map_err(|err| {
            tracing::warn!("wgpu device request failed: {err}");
            ComputeError::BackendUnavailable
        })?;

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            pipelines: Mutex::new(HashMap::new()),
        })
    }

    fn pipeline(&self, kernel: &Kernel) -> Arc<CachedPipeline> {
        let mut cache = self.pipelines.lock();
        if let Some(cached) = cache.get(kernel) {
            return Arc::clone(cached);
        }

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(kernel_name(kernel)),
                source: wgpu::ShaderSource::Wgsl(to_shader_source(kernel).into()),
            });

        let entries = (0..binding_count(kernel))
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: if is_uniform(kernel, binding) {
                        wgpu::BufferBindingType::Uniform
                    } else {
                        wgpu::BufferBindingType::Storage {
                            read_only: !is_output(kernel, binding),
                        }
                    },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect::<Vec<_>>();
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(kernel_name(kernel)),
                entries: &entries,
            });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(kernel_name(kernel)),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(kernel_name(kernel)),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: "main",
            });

        tracing::debug!(kernel = kernel_name(kernel), "compiled compute pipeline");
        let cached = Arc::new(CachedPipeline { layout, pipeline });
        cache.insert(*kernel, Arc::clone(&cached));
        cached
    }
}

/// Returns the WGSL entry point name for a given [`Kernel`].
fn kernel_name(kernel: &Kernel) -> &'static str {
    match kernel {
        Kernel::BinOccupancy => "bin_occupancy",
        Kernel::RayMarch => "ray_march",
    }
}

/// Provides the WGSL shader source associated with the kernel.
fn to_shader_source(kernel: &Kernel) -> &'static str {
    match kernel {
        Kernel::BinOccupancy => include_str!("../../../shaders/bin_occupancy.wgsl"),
        Kernel::RayMarch => include_str!("../../../shaders/ray_march.wgsl"),
    }
}

/// Copies `data` into a buffer of at least [`MIN_BUFFER_SIZE`] bytes whose
/// length is a multiple of 4.
fn padded_contents(data: &[u8]) -> Vec<u8> {
    let len = data.len().max(MIN_BUFFER_SIZE).next_multiple_of(4);
    let mut contents = vec![0u8; len];
    contents[..data.len()].copy_from_slice(data);
    contents
}

impl ComputeBackend for WgpuBackend {
    fn dispatch(
        &self,
        kernel: &Kernel,
        bindings: &[BufferView],
        workgroups: [u32; 3],
    ) -> Result<Vec<Vec<u8>>, ComputeError> {
        if bindings.len() != binding_count(kernel) as usize {
            return Err(ComputeError::ShapeMismatch(
                "binding count does not match the kernel layout",
            ));
        }
        if bindings.iter().any(|view| !view.is_consistent()) {
            return Err(ComputeError::ShapeMismatch(
                "Buffer data length does not match product of shape dimensions and element size",
            ));
        }

        let cached = self.pipeline(kernel);

        let gpu_buffers = bindings
            .iter()
            .enumerate()
            .map(|(i, view)| {
                let binding = i as u32;
                self.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} binding {i}", kernel_name(kernel))),
                        contents: &padded_contents(&view.data),
                        usage: if is_uniform(kernel, binding) {
                            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST
                        } else {
                            wgpu::BufferUsages::STORAGE
                                | wgpu::BufferUsages::COPY_DST
                                | wgpu::BufferUsages::COPY_SRC
                        },
                    })
            })
            .collect::<Vec<_>>();

        let bind_group_entries = gpu_buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect::<Vec<_>>();
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel_name(kernel)),
            layout: &cached.layout,
            entries: &bind_group_entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel_name(kernel)),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&cached.pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            cpass.dispatch_workgroups(workgroups[0], workgroups[1], workgroups[2]);
        }

        let mut staging = Vec::new();
        for (i, view) in bindings.iter().enumerate() {
            if !is_output(kernel, i as u32) {
                continue;
            }
            let size = gpu_buffers[i].size();
            let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{} staging {i}", kernel_name(kernel))),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            encoder.copy_buffer_to_buffer(&gpu_buffers[i], 0, &staging_buffer, 0, size);
            staging.push((staging_buffer, view.data.len()));
        }

        self.queue.submit(Some(encoder.finish()));

        let mut results = Vec::with_capacity(staging.len());
        for (buffer, len) in &staging {
            let buffer_slice = buffer.slice(..);
            let (tx, rx) = std::sync::mpsc::channel();
            buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
                // The receiver outlives the poll below.
                let _ = tx.send(result);
            });
            self.device.poll(wgpu::Maintain::Wait);
            rx.recv()
                .map_err(|err| ComputeError::Readback(err.to_string()))?
                .map_err(|err| ComputeError::Readback(err.to_string()))?;
            let data = buffer_slice.get_mapped_range();
            results.push(data[..*len].to_vec());
            drop(data);
            buffer.unmap();
        }

        Ok(results)
    }
}
