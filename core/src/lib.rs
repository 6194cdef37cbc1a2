pub mod types;

use anyhow::{anyhow, Result};
use std::sync::{mpsc, Arc};
use tracing::info;
use wgpu::{
    util::DeviceExt, BindGroupLayoutDescriptor, BindGroupLayoutEntry, ShaderStages,
    CommandEncoder, CommandEncoderDescriptor, Device, Features, Instance, PollType, ComputePipelineDescriptor,
    PipelineLayoutDescriptor, Queue, ShaderModule, ShaderModuleDescriptor, ShaderSource,
    PipelineCompilationOptions, BindGroup, BindGroupEntry, BindGroupDescriptor, ComputePassDescriptor,
};

use types::{AbstractBuffer, AbstractBindGroupLayout, AbstractComputePipeline, BufferKind, BufferHandle};

/// Hardware limit on workgroups per dispatch dimension
pub const MAX_WORKGROUPS_PER_DIM: u32 = 65_535;

/// Context for GPU operations
#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<Device>,
    pub queue:  Arc<Queue>,
}

impl GpuContext {
    /* ------------------------------------------------------------------ */
    /* Construction                                                       */
    /* ------------------------------------------------------------------ */

    /// Open the default adapter. Half-precision shaders are enabled when the
    /// adapter supports them.
    pub async fn new() -> Result<Self> {
        let instance = Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .map_err(|e| anyhow!("No suitable adapter found: {}", e))?;

        let required_features = adapter.features() & Features::SHADER_F16;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("hswish-device"),
                required_features,
                ..Default::default()
            })
            .await?;

        info!(
            adapter = %adapter.get_info().name,
            shader_f16 = required_features.contains(Features::SHADER_F16),
            "gpu context ready"
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Whether WGSL `f16` storage and arithmetic are available on this device.
    pub fn supports_f16(&self) -> bool {
        self.device.features().contains(Features::SHADER_F16)
    }

    /* ------------------------------------------------------------------ */
    /* Buffers                                                            */
    /* ------------------------------------------------------------------ */

    /// Allocate an uninitialised GPU buffer.
    pub fn create_buffer(&self, size: u64, usage: BufferKind) -> AbstractBuffer {
        AbstractBuffer(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size,
            usage: usage.into(),
            mapped_at_creation: false,
        }))
    }

    /// Allocate and initialise a GPU buffer from host data.
    pub fn create_buffer_with_data(&self, data: &[u8], usage: BufferKind) -> AbstractBuffer {
        AbstractBuffer(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: None,
            contents: data,
            usage: usage.into(),
        }))
    }

    /// Blocking read: map-read entire buffer, return Vec<u8>.
    /// `buffer` must have been created as `BufferKind::Download`.
    pub fn read_buffer(&self, buffer: &AbstractBuffer) -> Result<Vec<u8>> {
        let wgpu_buffer = buffer.raw();
        let slice = wgpu_buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(PollType::Wait)
            .map_err(|e| anyhow!("Device poll failed: {e}"))?;
        rx.recv()??;
        let data = slice.get_mapped_range().to_vec();
        wgpu_buffer.unmap();
        Ok(data)
    }

    /// Copy a storage buffer into a fresh staging buffer and read it back.
    pub fn read_back(&self, buffer: &AbstractBuffer) -> Result<Vec<u8>> {
        let size = buffer.size();
        let staging = self.create_buffer(size, BufferKind::Download);
        self.copy_buffer_to_buffer(buffer, &staging, size);
        self.read_buffer(&staging)
    }

    /* ------------------------------------------------------------------ */
    /* Encoder helpers                                                    */
    /* ------------------------------------------------------------------ */
    fn create_encoder(&self, label: &str) -> CommandEncoder {
        self.device
            .create_command_encoder(&CommandEncoderDescriptor { label: Some(label) })
    }

    fn submit_encoder(&self, encoder: CommandEncoder) {
        self.queue.submit(Some(encoder.finish()));
    }

    pub fn copy_buffer_to_buffer(&self, src: &AbstractBuffer, dst: &AbstractBuffer, size: u64) {
        let mut enc = self.create_encoder("copy-b2b");
        enc.copy_buffer_to_buffer(src.raw(), 0, dst.raw(), 0, size);
        self.submit_encoder(enc);
    }

    /* ------------------------------------------------------------------ */
    /* Shaders Preprocessing                                              */
    /* ------------------------------------------------------------------ */

    /// Create a storage buffer layout for a compute shader.
    /// Bindings are `0..n_in` read-only, then `n_in..n_in + n_out` read-write.
    pub fn create_storage_layout(&self, n_in: usize, n_out: usize) -> Arc<AbstractBindGroupLayout> {
        let entries: Vec<BindGroupLayoutEntry> = (0..n_in + n_out)
            .map(|i| BindGroupLayoutEntry {
                binding: i as u32,
                visibility: ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: i < n_in },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        let bgl = self.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("storage-layout"),
            entries: &entries,
        });
        Arc::new(AbstractBindGroupLayout(bgl))
    }

    /// Create a compute pipeline from WGSL source code.
    pub fn create_compute_pipeline(
        &self,
        src: &str,
        entry: &str,
        layout: &AbstractBindGroupLayout,
    ) -> Arc<AbstractComputePipeline> {
        let module: ShaderModule = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some("wgsl-module"),
            source: ShaderSource::Wgsl(src.into()),
        });
        let pipeline_layout = self.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("compute-pl-layout"),
            bind_group_layouts: &[&layout.0],
            push_constant_ranges: &[],
        });
        let pipeline = self.device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("compute-pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some(entry),
            compilation_options: PipelineCompilationOptions::default(),
            cache: None,
        });
        Arc::new(AbstractComputePipeline(pipeline))
    }

    /* ------------------------------------------------------------------ */
    /* Dispatch                                                           */
    /* ------------------------------------------------------------------ */

    fn create_storage_bind_group(
        &self,
        layout: &AbstractBindGroupLayout,
        inputs: &[&AbstractBuffer],
        outputs: &[&AbstractBuffer],
    ) -> BindGroup {
        let entries: Vec<BindGroupEntry> = inputs
            .iter()
            .chain(outputs.iter())
            .enumerate()
            .map(|(i, b)| BindGroupEntry {
                binding: i as u32,
                resource: b.0.as_entire_binding(),
            })
            .collect();
        self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("storage-bg"),
            layout: &layout.0,
            entries: &entries,
        })
    }

    /// Dispatch a 1-D kernel over `total_elems`. Kernels must grid-stride,
    /// since the workgroup count is capped at `MAX_WORKGROUPS_PER_DIM`.
    pub fn dispatch_compute_1d(
        &self,
        pipeline: &AbstractComputePipeline,
        layout: &AbstractBindGroupLayout,
        inputs: &[BufferHandle],
        outputs: &[BufferHandle],
        total_elems: u32,
        workgroup_size: u32,
    ) {
        let input_refs: Vec<&AbstractBuffer> = inputs.iter().map(|h| h.as_raw()).collect();
        let output_refs: Vec<&AbstractBuffer> = outputs.iter().map(|h| h.as_raw()).collect();

        let bg = self.create_storage_bind_group(layout, &input_refs, &output_refs);
        let (x, _, _) = self.dispatch_size_1d(total_elems, workgroup_size);

        let mut enc = self.create_encoder("dispatch-1d");
        {
            let mut pass = enc.begin_compute_pass(&ComputePassDescriptor::default());
            pass.set_pipeline(&pipeline.0);
            pass.set_bind_group(0, &bg, &[]);
            pass.dispatch_workgroups(x, 1, 1);
        }
        self.submit_encoder(enc);
    }

    /* ------------------------------------------------------------------ */
    /* Misc utils                                                         */
    /* ------------------------------------------------------------------ */

    /// Helper: compute `(x,1,1)` for 1-D dispatch with `workgroup_size`.
    pub fn dispatch_size_1d(&self, total: u32, workgroup_size: u32) -> (u32, u32, u32) {
        (dispatch_groups(total, workgroup_size), 1, 1)
    }
}

fn dispatch_groups(total: u32, workgroup_size: u32) -> u32 {
    total.div_ceil(workgroup_size).clamp(1, MAX_WORKGROUPS_PER_DIM)
}
