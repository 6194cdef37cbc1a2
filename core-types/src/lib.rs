use bytemuck::{Pod, Zeroable};
use std::fmt;

include!("generated_data_types.rs");

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum number of dimensions a host shape can carry
pub const MAX_DIMS: usize = 8;

/// Shape handed over by the host: rank + per-axis extents.
///
/// Axes past `nb_dims` are always zero, so two `Dims` with the same rank and
/// extents compare equal.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq, Eq, Hash)]
pub struct Dims {
    pub nb_dims: i32,
    pub d:       [i32; MAX_DIMS],
}

impl Dims {
    /// Build a shape from its extents.
    ///
    /// Panics if `extents` has more than `MAX_DIMS` axes.
    pub fn new(extents: &[i32]) -> Self {
        assert!(
            extents.len() <= MAX_DIMS,
            "shape rank {} exceeds MAX_DIMS ({})",
            extents.len(),
            MAX_DIMS
        );
        let mut dims = Dims::zeroed();
        dims.nb_dims = extents.len() as i32;
        dims.d[..extents.len()].copy_from_slice(extents);
        dims
    }

    /// Channel-first per-sample shape (batch excluded)
    pub fn chw(c: i32, h: i32, w: i32) -> Self {
        Self::new(&[c, h, w])
    }

    pub fn rank(&self) -> usize {
        self.nb_dims.max(0) as usize
    }

    /// The populated extents
    pub fn as_slice(&self) -> &[i32] {
        &self.d[..self.rank().min(MAX_DIMS)]
    }

    /// Number of elements described by this shape
    pub fn volume(&self) -> i64 {
        self.as_slice().iter().map(|&e| e as i64).product()
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, e) in self.as_slice().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{e}")?;
        }
        write!(f, ")")
    }
}

/// Memory layouts the host may propose during format negotiation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TensorFormat {
    /// Channel-first, densely packed
    Nchw,
    Nc2hw2,
    Nhwc8,
    Nc4hw4,
    Nc16hw16,
    Nc32hw32,
}

impl TensorFormat {
    pub const ALL: [TensorFormat; 6] = [
        TensorFormat::Nchw,
        TensorFormat::Nc2hw2,
        TensorFormat::Nhwc8,
        TensorFormat::Nc4hw4,
        TensorFormat::Nc16hw16,
        TensorFormat::Nc32hw32,
    ];
}
