//! CSR matrix times dense column block, parallelized over columns.
//!
//! Threads partition the right-hand-side columns, so every thread writes a
//! disjoint set of output columns and no accumulator is shared. The adjoint
//! path conjugates values in place of materializing the transpose.

use rayon::prelude::*;

use matfree_traits::types::{c32, Error, Result};
use matfree_traits::DeviceArray;

#[allow(clippy::too_many_arguments)]
pub(crate) fn ccsrmm(
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
    let (m, k) = a_shape;
    let (rows, cols) = if adjoint { (k, m) } else { (m, k) };
    if x.shape().0 != cols || y.shape().0 != rows || x.shape().1 != y.shape().1 {
        return Err(Error::Backend(format!(
            "csrmm dimension mismatch: {:?} = op{:?} * {:?} (adjoint={})",
            y.shape(),
            a_shape,
            x.shape(),
            adjoint
        )));
    }
    if indptr.len() != m + 1 {
        return Err(Error::Backend(format!(
            "csrmm indptr length {} does not match {} rows",
            indptr.len(),
            m
        )));
    }
    let base = index_base;
    let zero = c32::new(0.0, 0.0);
    let n = x.shape().1;

    (0..n).into_par_iter().for_each(|j| {
        // Safety: each task owns output column j exclusively; x is read-only.
        let ycol = unsafe { y.col_slice_mut(j) };
        let xcol = unsafe { x.col_slice(j) };
        if adjoint {
            if beta == zero {
                ycol.fill(zero);
            } else if beta != c32::new(1.0, 0.0) {
                for v in ycol.iter_mut() {
                    *v *= beta;
                }
            }
            for i in 0..m {
                let lo = (indptr[i] - base) as usize;
                let hi = (indptr[i + 1] - base) as usize;
                let xi = alpha * xcol[i];
                for p in lo..hi {
                    let c = (indices[p] - base) as usize;
                    ycol[c] += data[p].conj() * xi;
                }
            }
        } else {
            for i in 0..m {
                let lo = (indptr[i] - base) as usize;
                let hi = (indptr[i + 1] - base) as usize;
                let mut acc = zero;
                for p in lo..hi {
                    acc += data[p] * xcol[(indices[p] - base) as usize];
                }
                ycol[i] = if beta == zero {
                    alpha * acc
                } else {
                    alpha * acc + beta * ycol[i]
                };
            }
        }
    });
    Ok(())
}
