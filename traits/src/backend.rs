//! The numerical backend contract.
//!
//! Every operator node invokes numerics exclusively through this trait:
//! dense BLAS-style primitives, a cached batched 3-D FFT, and CSR
//! matrix-matrix multiply. Implementations are synchronous at this boundary;
//! any device-stream asynchrony must complete before a call returns.

use crate::arrays::{DeviceArray, HostArray};
use crate::types::{c32, Dtype, Result};

pub trait Backend: Send + Sync {
    /// Diagnostic backend name.
    fn name(&self) -> &'static str;

    /// Worker threads available to the backend's kernels.
    fn get_max_threads(&self) -> usize;

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------

    /// Allocate a zero-filled device array.
    fn zero_array(&self, shape: (usize, usize), dtype: Dtype) -> DeviceArray;

    /// Allocate a device array holding a copy of `host`.
    fn copy_array(&self, host: &HostArray) -> DeviceArray;

    // ------------------------------------------------------------------
    // BLAS
    // ------------------------------------------------------------------

    /// `x *= alpha`
    fn scale(&self, x: &DeviceArray, alpha: c32);

    /// `y += alpha * x`
    fn axpy(&self, y: &DeviceArray, alpha: c32, x: &DeviceArray) -> Result<()>;

    /// Real part of the conjugated inner product `x^H y`.
    ///
    /// The imaginary part is discarded; for the Hermitian systems the
    /// conjugate-gradient driver solves it is zero up to rounding.
    fn dot(&self, x: &DeviceArray, y: &DeviceArray) -> Result<f32>;

    /// Squared 2-norm `||x||^2` (not the norm itself).
    fn norm2(&self, x: &DeviceArray) -> f32;

    /// `y <- alpha * op(M) * x + beta * y`, with `op` the identity when
    /// `forward` and the conjugate transpose otherwise.
    fn cgemm(
        &self,
        y: &DeviceArray,
        m: &DeviceArray,
        x: &DeviceArray,
        alpha: c32,
        beta: c32,
        forward: bool,
    ) -> Result<()>;

    // ------------------------------------------------------------------
    // Sparse
    // ------------------------------------------------------------------

    /// Index base of device CSR handles for this backend (0 or 1).
    fn csr_index_base(&self) -> i32;

    /// CSR matrix times dense column block:
    /// `y <- alpha * op(A) * x + beta * y` with `op` selected by `adjoint`.
    #[allow(clippy::too_many_arguments)]
    fn ccsrmm(
        &self,
        y: &DeviceArray,
        a_shape: (usize, usize),
        indices: &[i32],
        indptr: &[i32],
        data: &[c32],
        index_base: i32,
        x: &DeviceArray,
        alpha: c32,
        beta: c32,
        adjoint: bool,
    ) -> Result<()>;

    // ------------------------------------------------------------------
    // FFT
    // ------------------------------------------------------------------

    /// Batched unscaled 3-D DFT over the leading three axes: `x` and `y`
    /// hold `size / (u*v*w)` transforms of logical shape `ft_shape`,
    /// column-major and contiguous.
    fn fftn(&self, y: &DeviceArray, x: &DeviceArray, ft_shape: [usize; 3]) -> Result<()>;

    /// Batched unscaled inverse 3-D DFT (no `1/N` rescaling).
    fn ifftn(&self, y: &DeviceArray, x: &DeviceArray, ft_shape: [usize; 3]) -> Result<()>;

    /// Transient workspace bytes the backend needs for one batched
    /// transform of logical shape `shape[..3]` with `shape[3]` columns.
    fn fft_workspace_size(&self, shape: [usize; 4]) -> usize;
}
