//! wgpu-based GPU compute backend (Metal / Vulkan / DX12).

use bytemuck::{Pod, Zeroable};
use ndarray::Array2;
use num_complex::Complex;
use wgpu::util::DeviceExt;

use crate::error::{DeinterlaceError, Result};

use super::{BufferInner, ComputeBackend, DeviceBuffer};

// ---------------------------------------------------------------------------
// Inline WGSL shaders for elementwise operations
// ---------------------------------------------------------------------------

const NORMALIZE_PHASE_WGSL: &str = r"
struct Params { count: u32, epsilon: f32 }
@group(0) @binding(0) var<storage, read>       input:  array<vec2<f32>>;
@group(0) @binding(1) var<storage, read_write> output: array<vec2<f32>>;
@group(0) @binding(2) var<uniform>             params: Params;
@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>) {
    let i = gid.y * nwg.x * 256u + gid.x;
    if i >= params.count { return; }
    let v = input[i];
    output[i] = v / (length(v) + params.epsilon);
}
";

const CONJUGATE_WGSL: &str = r"
struct Params { count: u32 }
@group(0) @binding(0) var<storage, read>       input:  array<vec2<f32>>;
@group(0) @binding(1) var<storage, read_write> output: array<vec2<f32>>;
@group(0) @binding(2) var<uniform>             params: Params;
@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>) {
    let i = gid.y * nwg.x * 256u + gid.x;
    if i >= params.count { return; }
    output[i] = vec2<f32>(input[i].x, -input[i].y);
}
";

const COMPLEX_MUL_WGSL: &str = r"
struct Params { count: u32 }
@group(0) @binding(0) var<storage, read>       a:      array<vec2<f32>>;
@group(0) @binding(1) var<storage, read>       b:      array<vec2<f32>>;
@group(0) @binding(2) var<storage, read_write> output: array<vec2<f32>>;
@group(0) @binding(3) var<uniform>             params: Params;
@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>) {
    let i = gid.y * nwg.x * 256u + gid.x;
    if i >= params.count { return; }
    let x = a[i];
    let y = b[i];
    output[i] = vec2<f32>(x.x * y.x - x.y * y.y, x.x * y.y + x.y * y.x);
}
";

const EXTRACT_REAL_SCALED_WGSL: &str = r"
struct Params { count: u32, scale: f32 }
@group(0) @binding(0) var<storage, read>       input:  array<vec2<f32>>;
@group(0) @binding(1) var<storage, read_write> output: array<vec2<f32>>;
@group(0) @binding(2) var<uniform>             params: Params;
@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>) {
    let i = gid.y * nwg.x * 256u + gid.x;
    if i >= params.count { return; }
    output[i] = vec2<f32>(input[i].x * params.scale, 0.0);
}
";

// ---------------------------------------------------------------------------
// Uniform parameter structs (must match WGSL layouts exactly)
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct CountParams {
    count: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct PhaseParams {
    count: u32,
    epsilon: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ScaleParams {
    count: u32,
    scale: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct FftParams {
    n: u32,
    stage: u32,
    direction: f32,
    batch_count: u32,
    batch_stride: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ColumnMeanParams {
    rows: u32,
    cols: u32,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const WORKGROUP_SIZE: u32 = 256;
const MAX_WORKGROUPS_PER_DIM: u32 = 65_535;

/// Bytes per complex element (two f32).
const COMPLEX_BYTES: u64 = 8;

fn gpu_buf(buf: &DeviceBuffer) -> Result<&wgpu::Buffer> {
    match &buf.inner {
        BufferInner::Wgpu { buffer } => Ok(buffer),
        BufferInner::Host(_) => Err(DeinterlaceError::GpuError(
            "WgpuBackend received a host buffer".into(),
        )),
    }
}

const fn div_ceil(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

/// Workgroup grid covering `count` invocations of a 1-D kernel, folded into
/// the y dimension once x runs out.
fn linear_workgroups(count: u32) -> (u32, u32, u32) {
    let groups = div_ceil(count.max(1), WORKGROUP_SIZE);
    if groups <= MAX_WORKGROUPS_PER_DIM {
        (groups, 1, 1)
    } else {
        (
            MAX_WORKGROUPS_PER_DIM,
            div_ceil(groups, MAX_WORKGROUPS_PER_DIM),
            1,
        )
    }
}

fn element_count(buf: &DeviceBuffer) -> Result<u32> {
    u32::try_from(buf.height * buf.width).map_err(|_| {
        DeinterlaceError::ResourceExhausted(format!(
            "{}x{} buffer exceeds the GPU index range",
            buf.height, buf.width
        ))
    })
}

fn request_adapter(instance: &wgpu::Instance) -> Result<wgpu::Adapter> {
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .map_err(|e| DeinterlaceError::GpuError(format!("No suitable GPU adapter found: {e}")))
}

// ---------------------------------------------------------------------------
// WgpuBackend
// ---------------------------------------------------------------------------

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    max_binding_bytes: u64,
    fft_pipeline: wgpu::ComputePipeline,
    normalize_phase_pipeline: wgpu::ComputePipeline,
    conjugate_pipeline: wgpu::ComputePipeline,
    complex_mul_pipeline: wgpu::ComputePipeline,
    extract_real_pipeline: wgpu::ComputePipeline,
    column_mean_pipeline: wgpu::ComputePipeline,
}

impl WgpuBackend {
    /// Whether an adapter can be found, without creating a device.
    pub fn adapter_present() -> bool {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        request_adapter(&instance).is_ok()
    }

    pub fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = request_adapter(&instance)?;

        let adapter_name = adapter.get_info().name.clone();
        tracing::info!("GPU adapter: {adapter_name}");

        // Ask for everything the adapter offers; large blocks need big storage bindings.
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("deinterlace"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            ..Default::default()
        }))
        .map_err(|e| DeinterlaceError::GpuError(format!("Failed to create GPU device: {e}")))?;

        let limits = device.limits();
        let max_binding_bytes =
            (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);

        let mk = |label, src: &str| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(src.into()),
            })
        };

        let fft_mod = mk("fft", include_str!("shaders/fft_stockham.wgsl"));
        let mean_mod = mk("column_mean", include_str!("shaders/column_mean.wgsl"));
        let phase_mod = mk("normalize_phase", NORMALIZE_PHASE_WGSL);
        let conj_mod = mk("conjugate", CONJUGATE_WGSL);
        let mul_mod = mk("complex_mul", COMPLEX_MUL_WGSL);
        let extr_mod = mk("extract_real", EXTRACT_REAL_SCALED_WGSL);

        let pipe = |module: &wgpu::ShaderModule| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: None,
                layout: None,
                module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        Ok(Self {
            adapter_name,
            max_binding_bytes,
            fft_pipeline: pipe(&fft_mod),
            normalize_phase_pipeline: pipe(&phase_mod),
            conjugate_pipeline: pipe(&conj_mod),
            complex_mul_pipeline: pipe(&mul_mod),
            extract_real_pipeline: pipe(&extr_mod),
            column_mean_pipeline: pipe(&mean_mod),
            device,
            queue,
        })
    }

    // --- Buffer helpers ---

    /// Refuse allocations the device cannot bind rather than letting wgpu
    /// fail validation later.
    fn check_capacity(&self, byte_size: u64) -> Result<()> {
        if byte_size > self.max_binding_bytes {
            return Err(DeinterlaceError::ResourceExhausted(format!(
                "GPU buffer of {byte_size} bytes exceeds the device limit of {} bytes; \
                 reduce the block size",
                self.max_binding_bytes
            )));
        }
        Ok(())
    }

    fn create_storage(&self, data: &[f32]) -> Result<wgpu::Buffer> {
        self.check_capacity(std::mem::size_of_val(data) as u64)?;
        Ok(self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: None,
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            }))
    }

    fn create_storage_uninit(&self, byte_size: u64) -> Result<wgpu::Buffer> {
        self.check_capacity(byte_size)?;
        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size: byte_size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }))
    }

    fn create_uniform<T: Pod>(&self, data: &T) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: None,
                contents: bytemuck::bytes_of(data),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
    }

    fn download_f32(&self, buffer: &wgpu::Buffer) -> Result<Vec<f32>> {
        let size = buffer.size();
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut enc = self.device.create_command_encoder(&Default::default());
        enc.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(enc.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        slice.map_async(wgpu::MapMode::Read, move |r| {
            tx.send(r).ok();
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| DeinterlaceError::GpuError(format!("Device poll failed: {e}")))?;
        rx.recv()
            .map_err(|_| DeinterlaceError::GpuError("GPU channel closed".into()))?
            .map_err(|e| DeinterlaceError::GpuError(format!("Buffer mapping failed: {e}")))?;

        let data = slice.get_mapped_range();
        let result: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();
        Ok(result)
    }

    /// Dispatch a single compute pass with one bind group at group(0).
    fn dispatch(
        &self,
        pipeline: &wgpu::ComputePipeline,
        entries: &[wgpu::BindGroupEntry],
        workgroups: (u32, u32, u32),
    ) {
        let layout = pipeline.get_bind_group_layout(0);
        let bg = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &layout,
            entries,
        });
        let mut enc = self.device.create_command_encoder(&Default::default());
        {
            let mut pass = enc.begin_compute_pass(&Default::default());
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bg, &[]);
            pass.dispatch_workgroups(workgroups.0, workgroups.1, workgroups.2);
        }
        self.queue.submit(std::iter::once(enc.finish()));
    }

    fn make_buffer(&self, buffer: wgpu::Buffer, height: usize, width: usize) -> DeviceBuffer {
        DeviceBuffer {
            inner: BufferInner::Wgpu { buffer },
            height,
            width,
        }
    }

    /// Run a one-input, one-output elementwise kernel over a complex buffer.
    fn map_complex(
        &self,
        pipeline: &wgpu::ComputePipeline,
        input: &DeviceBuffer,
        uniform: &wgpu::Buffer,
    ) -> Result<DeviceBuffer> {
        let buf = gpu_buf(input)?;
        let count = element_count(input)?;
        let out = self.create_storage_uninit(count as u64 * COMPLEX_BYTES)?;
        self.dispatch(
            pipeline,
            &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: out.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform.as_entire_binding(),
                },
            ],
            linear_workgroups(count),
        );
        Ok(self.make_buffer(out, input.height, input.width))
    }

    // --- FFT internal helpers ---

    /// Run batch 1-D Stockham FFT stages over every row. Returns the buffer
    /// holding the result.
    fn fft_1d_batch(&self, input: &DeviceBuffer, direction: f32) -> Result<wgpu::Buffer> {
        let src = gpu_buf(input)?;
        let n = input.width;
        if !n.is_power_of_two() {
            return Err(DeinterlaceError::GpuError(format!(
                "GPU row transform needs a power-of-two width, got {n}"
            )));
        }
        let total_complex = element_count(input)?;
        let n = n as u32;
        let batch_count = input.height as u32;

        let byte_size = total_complex as u64 * COMPLEX_BYTES;
        let buf_a = self.create_storage_uninit(byte_size)?;
        let buf_b = self.create_storage_uninit(byte_size)?;
        let num_stages = n.trailing_zeros();

        let stage_uniforms: Vec<wgpu::Buffer> = (0..num_stages)
            .map(|s| {
                self.create_uniform(&FftParams {
                    n,
                    stage: s,
                    direction,
                    batch_count,
                    batch_stride: n,
                })
            })
            .collect();

        let fft_layout = self.fft_pipeline.get_bind_group_layout(0);
        let total_butterflies = (n / 2) * batch_count;
        let (wg_x, wg_y, wg_z) = linear_workgroups(total_butterflies);

        let mut enc = self.device.create_command_encoder(&Default::default());
        enc.copy_buffer_to_buffer(src, 0, &buf_a, 0, byte_size);

        for stage in 0..num_stages {
            let (src, dst) = if stage % 2 == 0 {
                (&buf_a, &buf_b)
            } else {
                (&buf_b, &buf_a)
            };

            let bg = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: None,
                layout: &fft_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: src.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: dst.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: stage_uniforms[stage as usize].as_entire_binding(),
                    },
                ],
            });

            {
                let mut pass = enc.begin_compute_pass(&Default::default());
                pass.set_pipeline(&self.fft_pipeline);
                pass.set_bind_group(0, &bg, &[]);
                pass.dispatch_workgroups(wg_x, wg_y, wg_z);
            }
        }

        self.queue.submit(std::iter::once(enc.finish()));

        // Result is in buf_a for even number of stages, buf_b for odd
        if num_stages % 2 == 0 {
            Ok(buf_a)
        } else {
            Ok(buf_b)
        }
    }
}

// ---------------------------------------------------------------------------
// ComputeBackend implementation
// ---------------------------------------------------------------------------

impl ComputeBackend for WgpuBackend {
    fn name(&self) -> &str {
        &self.adapter_name
    }

    fn is_gpu(&self) -> bool {
        true
    }

    fn upload(&self, data: &Array2<f64>) -> Result<DeviceBuffer> {
        let (h, w) = data.dim();
        let mut interleaved = Vec::new();
        interleaved
            .try_reserve_exact(h * w * 2)
            .map_err(|e| DeinterlaceError::ResourceExhausted(format!("upload staging: {e}")))?;
        for &v in data.iter() {
            interleaved.push(v as f32);
            interleaved.push(0.0);
        }
        let buffer = self.create_storage(&interleaved)?;
        Ok(self.make_buffer(buffer, h, w))
    }

    fn download(&self, input: &DeviceBuffer) -> Result<Array2<Complex<f64>>> {
        let data = self.download_f32(gpu_buf(input)?)?;
        let values: Vec<Complex<f64>> = data
            .chunks_exact(2)
            .map(|pair| Complex::new(pair[0] as f64, pair[1] as f64))
            .collect();
        Ok(Array2::from_shape_vec((input.height, input.width), values)?)
    }

    fn fft_rows(&self, input: &DeviceBuffer) -> Result<DeviceBuffer> {
        let out = self.fft_1d_batch(input, 1.0)?;
        Ok(self.make_buffer(out, input.height, input.width))
    }

    fn ifft_rows_real(&self, input: &DeviceBuffer) -> Result<DeviceBuffer> {
        let spectrum = self.fft_1d_batch(input, -1.0)?;
        let spectrum = self.make_buffer(spectrum, input.height, input.width);
        let uniform = self.create_uniform(&ScaleParams {
            count: element_count(input)?,
            scale: 1.0 / input.width as f32,
        });
        self.map_complex(&self.extract_real_pipeline, &spectrum, &uniform)
    }

    fn normalize_phase(&self, input: &DeviceBuffer, epsilon: f64) -> Result<DeviceBuffer> {
        let uniform = self.create_uniform(&PhaseParams {
            count: element_count(input)?,
            epsilon: epsilon as f32,
        });
        self.map_complex(&self.normalize_phase_pipeline, input, &uniform)
    }

    fn conjugate(&self, input: &DeviceBuffer) -> Result<DeviceBuffer> {
        let uniform = self.create_uniform(&CountParams {
            count: element_count(input)?,
        });
        self.map_complex(&self.conjugate_pipeline, input, &uniform)
    }

    fn complex_mul(&self, a: &DeviceBuffer, b: &DeviceBuffer) -> Result<DeviceBuffer> {
        a.ensure_same_dim(b)?;
        let a_buf = gpu_buf(a)?;
        let b_buf = gpu_buf(b)?;
        let count = element_count(a)?;
        let out = self.create_storage_uninit(count as u64 * COMPLEX_BYTES)?;
        let uniform = self.create_uniform(&CountParams { count });

        self.dispatch(
            &self.complex_mul_pipeline,
            &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: a_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: b_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: out.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: uniform.as_entire_binding(),
                },
            ],
            linear_workgroups(count),
        );
        Ok(self.make_buffer(out, a.height, a.width))
    }

    fn column_mean(&self, input: &DeviceBuffer) -> Result<Vec<f64>> {
        let buf = gpu_buf(input)?;
        let cols = input.width as u32;
        let out = self.create_storage_uninit(cols as u64 * 4)?;
        let uniform = self.create_uniform(&ColumnMeanParams {
            rows: input.height as u32,
            cols,
        });

        self.dispatch(
            &self.column_mean_pipeline,
            &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: out.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform.as_entire_binding(),
                },
            ],
            (div_ceil(cols, WORKGROUP_SIZE), 1, 1),
        );

        let means = self.download_f32(&out)?;
        Ok(means.into_iter().map(f64::from).collect())
    }
}
