//! Reference CPU backend for the matfree operator algebra.
//!
//! Implements the full [`Backend`] contract in pure Rust: the dense cgemm
//! rides on `matrixmultiply`, the batched 3-D FFT on cached `rustfft`
//! plans, and CSRMM on a rayon column-parallel kernel. Device CSR handles
//! created against this backend use 0-based indices.

mod blas;
mod csrmm;
mod fft;

use matfree_traits::types::{c32, Dtype, Result};
use matfree_traits::{Backend, DeviceArray, HostArray};

pub struct CpuBackend {
    fft_plans: fft::PlanCache,
}

impl CpuBackend {
    pub fn new() -> CpuBackend {
        CpuBackend {
            fft_plans: fft::PlanCache::new(),
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        CpuBackend::new()
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn get_max_threads(&self) -> usize {
        rayon::current_num_threads()
    }

    fn zero_array(&self, shape: (usize, usize), dtype: Dtype) -> DeviceArray {
        DeviceArray::zeros(shape, dtype)
    }

    fn copy_array(&self, host: &HostArray) -> DeviceArray {
        DeviceArray::from_host(host)
    }

    fn scale(&self, x: &DeviceArray, alpha: c32) {
        blas::scale(x, alpha)
    }

    fn axpy(&self, y: &DeviceArray, alpha: c32, x: &DeviceArray) -> Result<()> {
        blas::axpy(y, alpha, x)
    }

    fn dot(&self, x: &DeviceArray, y: &DeviceArray) -> Result<f32> {
        blas::dot(x, y)
    }

    fn norm2(&self, x: &DeviceArray) -> f32 {
        blas::norm2(x)
    }

    fn cgemm(
        &self,
        y: &DeviceArray,
        m: &DeviceArray,
        x: &DeviceArray,
        alpha: c32,
        beta: c32,
        forward: bool,
    ) -> Result<()> {
        blas::cgemm(y, m, x, alpha, beta, forward)
    }

    fn csr_index_base(&self) -> i32 {
        0
    }

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
    ) -> Result<()> {
        csrmm::ccsrmm(
            y, a_shape, indices, indptr, data, index_base, x, alpha, beta, adjoint,
        )
    }

    fn fftn(&self, y: &DeviceArray, x: &DeviceArray, ft_shape: [usize; 3]) -> Result<()> {
        self.fft_plans.get(ft_shape).execute(y, x, false)
    }

    fn ifftn(&self, y: &DeviceArray, x: &DeviceArray, ft_shape: [usize; 3]) -> Result<()> {
        self.fft_plans.get(ft_shape).execute(y, x, true)
    }

    fn fft_workspace_size(&self, shape: [usize; 4]) -> usize {
        self.fft_plans
            .get([shape[0], shape[1], shape[2]])
            .workspace_nbytes()
    }
}
