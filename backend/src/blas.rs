//! Dense complex BLAS-style primitives over device arrays.
//!
//! Level-1 routines iterate columns so that strided sub-views work; the
//! level-3 cgemm hands column-major strides to `matrixmultiply`, expressing
//! the conjugate transpose through swapped strides and the conjugate flag.

use matrixmultiply::CGemmOption;

use matfree_traits::types::{c32, Error, Result};
use matfree_traits::DeviceArray;

pub(crate) fn scale(x: &DeviceArray, alpha: c32) {
    for j in 0..x.shape().1 {
        // Safety: single writer per column, no reader while scaling.
        let col = unsafe { x.col_slice_mut(j) };
        for v in col.iter_mut() {
            *v *= alpha;
        }
    }
}

pub(crate) fn axpy(y: &DeviceArray, alpha: c32, x: &DeviceArray) -> Result<()> {
    if y.shape() != x.shape() {
        return Err(Error::Backend(format!(
            "axpy shape mismatch: {:?} vs {:?}",
            y.shape(),
            x.shape()
        )));
    }
    for j in 0..y.shape().1 {
        // Safety: x and y are distinct arrays; writes touch only column j of y.
        unsafe {
            let yc = y.col_slice_mut(j);
            let xc = x.col_slice(j);
            for (yv, xv) in yc.iter_mut().zip(xc.iter()) {
                *yv += alpha * *xv;
            }
        }
    }
    Ok(())
}

/// Real part of `x^H y`, accumulated in double precision.
pub(crate) fn dot(x: &DeviceArray, y: &DeviceArray) -> Result<f32> {
    if y.shape() != x.shape() {
        return Err(Error::Backend(format!(
            "dot shape mismatch: {:?} vs {:?}",
            x.shape(),
            y.shape()
        )));
    }
    let mut acc = 0.0f64;
    for j in 0..x.shape().1 {
        // Safety: read-only access.
        unsafe {
            let xc = x.col_slice(j);
            let yc = y.col_slice(j);
            for (xv, yv) in xc.iter().zip(yc.iter()) {
                // re(conj(x) * y)
                acc += (xv.re as f64) * (yv.re as f64) + (xv.im as f64) * (yv.im as f64);
            }
        }
    }
    Ok(acc as f32)
}

/// Squared 2-norm.
pub(crate) fn norm2(x: &DeviceArray) -> f32 {
    let mut acc = 0.0f64;
    for j in 0..x.shape().1 {
        // Safety: read-only access.
        let col = unsafe { x.col_slice(j) };
        for v in col {
            acc += (v.re as f64) * (v.re as f64) + (v.im as f64) * (v.im as f64);
        }
    }
    acc as f32
}

pub(crate) fn cgemm(
    y: &DeviceArray,
    m: &DeviceArray,
    x: &DeviceArray,
    alpha: c32,
    beta: c32,
    forward: bool,
) -> Result<()> {
    let (mr, mc) = m.shape();
    let (rows, cols) = if forward { (mr, mc) } else { (mc, mr) };
    if x.shape().0 != cols || y.shape().0 != rows || x.shape().1 != y.shape().1 {
        return Err(Error::Backend(format!(
            "cgemm dimension mismatch: {:?} = op{:?} * {:?} (forward={})",
            y.shape(),
            m.shape(),
            x.shape(),
            forward
        )));
    }
    let n = x.shape().1;
    let k = if forward { mc } else { mr };
    let lda = m.leading_dim() as isize;
    let (rsa, csa, flag) = if forward {
        (1, lda, CGemmOption::Standard)
    } else {
        (lda, 1, CGemmOption::Conjugate)
    };
    // Safety: Complex<f32> is repr(C) { re, im }, layout-identical to
    // matrixmultiply's [f32; 2] element; x and y are distinct arrays.
    unsafe {
        matrixmultiply::cgemm(
            flag,
            CGemmOption::Standard,
            rows,
            k,
            n,
            [alpha.re, alpha.im],
            m.as_ptr() as *const [f32; 2],
            rsa,
            csa,
            x.as_ptr() as *const [f32; 2],
            1,
            x.leading_dim() as isize,
            [beta.re, beta.im],
            y.as_mut_ptr() as *mut [f32; 2],
            1,
            y.leading_dim() as isize,
        );
    }
    Ok(())
}
