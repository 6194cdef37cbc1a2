/// Supported element types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    F32,
    F16,
    I8,
    I32,
}

impl DataType {
    /// Size of one element, in bytes
    pub fn size_in_bytes(self) -> usize {
        match self {
            DataType::F32 => std::mem::size_of::<f32>(),
            DataType::F16 => std::mem::size_of::<half::f16>(),
            DataType::I8 => std::mem::size_of::<i8>(),
            DataType::I32 => std::mem::size_of::<i32>(),
        }
    }

    /// Lowercase name used in log output
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::F32 => "float32",
            DataType::F16 => "float16",
            DataType::I8 => "int8",
            DataType::I32 => "int32",
        }
    }
}

/// Marker-trait so we can go from T to DataType
pub trait Element: bytemuck::Pod {
    const DTYPE: DataType;
}

impl Element for f32 { const DTYPE: DataType = DataType::F32; }

impl Element for half::f16 { const DTYPE: DataType = DataType::F16; }

impl Element for i8 { const DTYPE: DataType = DataType::I8; }

impl Element for i32 { const DTYPE: DataType = DataType::I32; }
