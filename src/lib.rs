//! Matrix-free linear operator algebra for iterative imaging
//! reconstructions.
//!
//! A reconstruction system matrix is built as a tree: leaves are concrete
//! matrices ([`operators::DenseMatrix`], [`operators::SpMatrix`]) or
//! transforms ([`operators::UnscaledFFT`]); interior nodes compose children
//! by product, direct sum, or stacking. Applying the tree evaluates
//! `y <- alpha * A * x + beta * y` (or the adjoint) against a pluggable
//! numerical [`Backend`] without ever materializing the composite matrix,
//! which is what makes conjugate-gradient iteration over tall structured
//! operators tractable.

pub mod analyses;
pub mod operators;
pub mod solvers;
pub mod util;

pub use matfree_backend::CpuBackend;
pub use matfree_traits::operator::{walk, NodeBase, OpRef, Operator};
pub use matfree_traits::types::{c32, Dtype, Error, Result};
pub use matfree_traits::{
    Backend, CooHost, CsrHost, DeviceArray, DeviceCsr, DiaHost, DokHost, HostArray, SparseHost,
};

pub use analyses::{MemEstimate, Memusage};
pub use operators::{
    Adjoint, BlockDiag, DenseMatrix, HStack, KronI, OperatorExt, Product, SpMatrix, UnscaledFFT,
    VStack,
};
pub use solvers::{cg, CgSummary};
