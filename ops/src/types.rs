use bytemuck::Pod;
use core_types::{DataType, Dims};
use half::f16;
use hswish_core::types::BufferHandle;
use thiserror::Error;

/// Type tag of a creation-time field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PluginFieldType {
    Float32,
    Float16,
    Int8,
    Int32,
    Char,
    Dims,
}

/// Typed payload of a creation-time field
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PluginFieldData<'a> {
    Float32(&'a [f32]),
    Float16(&'a [f16]),
    Int8(&'a [i8]),
    Int32(&'a [i32]),
    Char(&'a str),
    Dims(&'a [Dims]),
}

impl PluginFieldData<'_> {
    pub fn field_type(&self) -> PluginFieldType {
        match self {
            PluginFieldData::Float32(_) => PluginFieldType::Float32,
            PluginFieldData::Float16(_) => PluginFieldType::Float16,
            PluginFieldData::Int8(_)    => PluginFieldType::Int8,
            PluginFieldData::Int32(_)   => PluginFieldType::Int32,
            PluginFieldData::Char(_)    => PluginFieldType::Char,
            PluginFieldData::Dims(_)    => PluginFieldType::Dims,
        }
    }

    /// Number of values (bytes for `Char`)
    pub fn len(&self) -> usize {
        match self {
            PluginFieldData::Float32(v) => v.len(),
            PluginFieldData::Float16(v) => v.len(),
            PluginFieldData::Int8(v)    => v.len(),
            PluginFieldData::Int32(v)   => v.len(),
            PluginFieldData::Char(s)    => s.len(),
            PluginFieldData::Dims(v)    => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named creation-time field
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PluginField<'a> {
    pub name: &'a str,
    pub data: PluginFieldData<'a>,
}

/// Field collection passed to / advertised by a creator
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PluginFieldCollection<'a> {
    pub fields: &'a [PluginField<'a>],
}

impl<'a> PluginFieldCollection<'a> {
    /// Schema of a creator that takes no fields
    pub const EMPTY: PluginFieldCollection<'static> = PluginFieldCollection { fields: &[] };

    pub fn new(fields: &'a [PluginField<'a>]) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PluginField<'a>> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A small parameter block bound as a read-only storage buffer after the inputs
#[derive(Debug, Clone)]
pub struct KernelParam {
    pub bytes: Vec<u8>,
}

impl KernelParam {
    pub fn from_pod<T: Pod>(value: &T) -> Self {
        Self { bytes: bytemuck::bytes_of(value).to_vec() }
    }
}

/// A GPU “kernel” ready to bind & dispatch
#[derive(Debug, Clone)]
pub struct GpuTask {
    pub pipeline_source: &'static str,
    pub entry_point:     &'static str,
    pub workgroup_size:  u32,
    pub dtype:           DataType,
    pub total_elems:     u32,
    pub params:          Vec<KernelParam>,
    pub inputs:          Vec<BufferHandle>,
    pub outputs:         Vec<BufferHandle>,
}

/// Errors reported to the host as a failed status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("no plugin creator {name} v{version} registered in namespace {namespace:?}")]
    UnknownCreator { name: String, version: String, namespace: String },
    #[error("plugin creator {name} v{version} already registered in namespace {namespace:?}")]
    DuplicateCreator { name: String, version: String, namespace: String },
    #[error("plugin {plugin} enqueued before configure_plugin")]
    NotConfigured { plugin: &'static str },
    #[error("plugin {plugin} expects {expected} {kind}, found {found}")]
    ArityMismatch { plugin: &'static str, kind: &'static str, expected: usize, found: usize },
    #[error("{kind} buffer {index} holds {actual} bytes, {required} required")]
    BufferTooSmall { kind: &'static str, index: usize, required: u64, actual: u64 },
    /// `count` saturates at `u64::MAX` when the element count itself overflows.
    #[error("{count} elements do not fit in a single dispatch")]
    ElementCountOverflow { count: u64 },
    #[error("plugin {plugin} has no kernel for element type {dtype}")]
    UnsupportedType { plugin: &'static str, dtype: DataType },
}

/// Trait to implement for each creator to work with inventory
pub trait RegistrationInfo {
    /// Unique name for the operator
    const NAME: &'static str;
    const VERSION: &'static str;
}
