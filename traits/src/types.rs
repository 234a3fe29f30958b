//! Scalar and dtype vocabulary, and the workspace error enum.

use std::fmt;

use thiserror::Error;

/// Single-precision complex scalar, the only element type the algebra
/// supports.
#[allow(non_camel_case_types)]
pub type c32 = num::complex::Complex<f32>;

/// Element type carried by every operator, array and matrix handle.
///
/// The algebra is complex64-only; the dtype still travels with each node so
/// that mismatches surface as reported errors rather than silent corruption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dtype {
    Complex64,
}

impl Dtype {
    /// Bytes per element.
    pub fn itemsize(&self) -> usize {
        match self {
            Dtype::Complex64 => std::mem::size_of::<c32>(),
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::Complex64 => write!(f, "complex64"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(
        "dimension mismatch: attempting {y_shape:?} = {op_shape:?} * {x_shape:?} \
         (forward={forward}, {op})"
    )]
    DimensionMismatch {
        y_shape: (usize, usize),
        op_shape: (usize, usize),
        x_shape: (usize, usize),
        forward: bool,
        op: String,
    },

    #[error("dtype mismatch: attempting {y} = {op} * {x}")]
    DtypeMismatch { y: Dtype, op: Dtype, x: Dtype },

    #[error("operators have inconsistent dtypes in {op}: {dtypes:?}")]
    InconsistentDtypes { op: String, dtypes: Vec<Dtype> },

    #[error(
        "mismatched shapes in Product: attempting {left:?} x {right:?} \
         ({left_name} x {right_name})"
    )]
    ProductShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
        left_name: String,
        right_name: String,
    },

    #[error("mismatched {axis}s in {op}: attempting to stack {entries}")]
    StackMismatch {
        op: &'static str,
        axis: &'static str,
        entries: String,
    },

    #[error("unsupported scalars for {op}: alpha={alpha}, beta={beta} (requires alpha=1, beta=0)")]
    UnsupportedScalars { op: String, alpha: c32, beta: c32 },

    #[error("cannot reshape non-contiguous array: shape {shape:?}, leading dim {ld}")]
    NonContiguous { shape: (usize, usize), ld: usize },

    #[error("operator shape must have positive dimensions: {shape:?} ({op})")]
    InvalidShape { shape: (usize, usize), op: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid sparse matrix: {0}")]
    InvalidSparse(String),

    #[error("backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dtype_display_and_itemsize() {
        assert_eq!(Dtype::Complex64.to_string(), "complex64");
        assert_eq!(Dtype::Complex64.itemsize(), 8);
    }

    #[test]
    fn dimension_mismatch_message_carries_shapes() {
        let err = Error::DimensionMismatch {
            y_shape: (4, 1),
            op_shape: (4, 3),
            x_shape: (2, 1),
            forward: true,
            op: "A".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("(4, 1)"));
        assert!(msg.contains("(4, 3)"));
        assert!(msg.contains("forward=true"));
    }
}
