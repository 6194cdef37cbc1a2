mod kernel_manager;

use anyhow::{bail, Result};
use bytemuck::cast_slice;
use tracing::debug;

use core_types::{DataType, Element};
use hswish_core::GpuContext;
use hswish_core::types::{BufferHandle, BufferKind};
use hswish_ops::{GpuTask, Plugin};

pub use kernel_manager::KernelManager;


/// Execution engine: runs the tasks plugins enqueue.
pub struct ExecutionEngine {
    ctx:     GpuContext,
    kernels: KernelManager,
}

impl ExecutionEngine {
    pub fn new(ctx: GpuContext) -> Self {
        Self { kernels: KernelManager::new(ctx.clone()), ctx }
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    pub fn kernels(&self) -> &KernelManager {
        &self.kernels
    }

    /// Upload host data into a new device buffer.
    pub fn upload<T: Element>(&self, data: &[T]) -> BufferHandle {
        BufferHandle::new(self.ctx.create_buffer_with_data(cast_slice(data), BufferKind::Main))
    }

    /// Allocate a zeroed device buffer for `len` elements of `T`.
    pub fn alloc<T: Element>(&self, len: usize) -> BufferHandle {
        let bytes = vec![0u8; len * T::DTYPE.size_in_bytes()];
        BufferHandle::new(self.ctx.create_buffer_with_data(&bytes, BufferKind::Main))
    }

    /// Read a whole device buffer back as `T`s.
    pub fn download<T: Element>(&self, buffer: &BufferHandle) -> Result<Vec<T>> {
        let bytes = self.ctx.read_back(buffer.as_raw())?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Ask `plugin` for its launch and run it.
    pub fn enqueue(
        &self,
        plugin:     &dyn Plugin,
        batch_size: usize,
        inputs:     &[BufferHandle],
        outputs:    &[BufferHandle],
        workspace:  Option<&BufferHandle>,
    ) -> Result<()> {
        let task = plugin.enqueue(batch_size, inputs, outputs, workspace)?;
        self.run_gpu_task(task)
    }

    pub fn run_gpu_task(&self, task: GpuTask) -> Result<()> {
        if task.dtype == DataType::F16 && !self.ctx.supports_f16() {
            bail!("kernel {} needs shader-f16, which this device lacks", task.entry_point);
        }
        if task.total_elems == 0 {
            return Ok(());
        }

        // 1) parameter blocks go after the inputs
        let params: Vec<BufferHandle> = task.params.iter()
            .map(|p| BufferHandle::new(self.ctx.create_buffer_with_data(&p.bytes, BufferKind::Main)))
            .collect();

        // 2) pipeline + layout
        let (pipeline, layout) = self.kernels.get(
            task.pipeline_source,
            task.entry_point,
            task.dtype,
            task.inputs.len(),
            params.len(),
            task.outputs.len(),
        );

        // 3) dispatch
        let all_inputs: Vec<BufferHandle> = task.inputs.iter().cloned().chain(params).collect();
        debug!(entry = task.entry_point, total = task.total_elems, "dispatch");
        self.ctx.dispatch_compute_1d(
            &pipeline,
            &layout,
            &all_inputs,
            &task.outputs,
            task.total_elems,
            task.workgroup_size,
        );

        Ok(())
    }
}


/* ------------------------------------------------------------------------- */
/*                                  Tests                                    */
/* ------------------------------------------------------------------------- */
