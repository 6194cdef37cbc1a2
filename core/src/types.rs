use std::sync::Arc;
use wgpu::{Buffer, BufferUsages, BindGroupLayout, ComputePipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Main,
    Download,
}
impl From<BufferKind> for BufferUsages {
    fn from(kind: BufferKind) -> Self {
        match kind {
            BufferKind::Main => BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            BufferKind::Download => BufferUsages::MAP_READ | BufferUsages::COPY_DST,
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct AbstractBuffer(pub(crate) Buffer);
impl AbstractBuffer {
    pub(crate) fn raw(&self) -> &wgpu::Buffer {
        &self.0
    }

    pub fn size(&self) -> u64 {
        self.0.size()
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct AbstractBindGroupLayout(pub(crate) BindGroupLayout);

#[derive(Debug, Eq, PartialEq)]
pub struct AbstractComputePipeline(pub(crate) ComputePipeline);

/// Shared handle to a device buffer, as the host hands it to a plugin
#[derive(Clone, Debug)]
pub struct BufferHandle(Arc<AbstractBuffer>);
impl BufferHandle {
    pub fn new(inner: AbstractBuffer) -> Self { BufferHandle(Arc::new(inner)) }
    pub fn as_raw(&self) -> &AbstractBuffer { &self.0 }
    pub fn size(&self) -> u64 { self.0.size() }
}
