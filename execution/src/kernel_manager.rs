use std::{
    collections::HashMap,
    sync::Arc,
};
use parking_lot::Mutex;
use tracing::debug;

use hswish_core::{GpuContext, types::AbstractBindGroupLayout, types::AbstractComputePipeline};
use core_types::DataType;

/// Signature of a specialized kernel.
///
/// The bind group is laid out as `n_in` tensor inputs, then `p_len`
/// parameter blocks (all read-only), then `n_out` outputs. The same WGSL
/// entry compiled for another binding count is a different pipeline.
#[derive(Clone, PartialEq, Eq, Hash)]
struct KernelKey {
    src:   Arc<str>,
    ent:   Arc<str>,
    /// f16 and f32 HardSwish kernels share an arity but not a source
    dtype: DataType,
    n_in:  usize,
    p_len: usize,
    n_out: usize,
}

struct PipelineBundle {
    pipeline: Arc<AbstractComputePipeline>,
    layout:   Arc<AbstractBindGroupLayout>,
}

/// Compiles each plugin kernel once and hands out the cached pipeline afterwards.
///
/// `ExecutionEngine` asks for a pipeline per enqueued `GpuTask`; repeated
/// launches of a configured plugin hit the cache.
pub struct KernelManager {
    ctx:   GpuContext,
    cache: Mutex<HashMap<KernelKey, Arc<PipelineBundle>>>,
}

impl KernelManager {
    pub fn new(ctx: GpuContext) -> Self {
        Self { ctx, cache: Mutex::new(HashMap::new()) }
    }

    pub fn get(
        &self,
        src:   &str,
        entry: &str,
        dtype: DataType,
        n_in:  usize,
        p_len: usize,
        n_out: usize,
    ) -> (Arc<AbstractComputePipeline>, Arc<AbstractBindGroupLayout>) {
        let key = KernelKey {
            src: Arc::from(src),
            ent: Arc::from(entry),
            dtype,
            n_in,
            p_len,
            n_out,
        };

        // lock spans compilation: each key is built at most once
        let mut cache = self.cache.lock();
        if let Some(b) = cache.get(&key) {
            return (b.pipeline.clone(), b.layout.clone());
        }

        debug!(entry, %dtype, n_in, p_len, n_out, "compiling kernel");
        // parameter blocks are bound as extra read-only inputs
        let layout   = self.ctx.create_storage_layout(n_in + p_len, n_out);
        let pipeline = self.ctx.create_compute_pipeline(src, entry, &layout);

        let bundle = Arc::new(PipelineBundle { pipeline: pipeline.clone(), layout: layout.clone() });
        cache.insert(key, bundle);

        (pipeline, layout)
    }

    /// Number of compiled kernels
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
