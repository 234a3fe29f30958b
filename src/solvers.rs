//! Conjugate gradient over the operator algebra.
//!
//! The iteration only touches the backend through `axpy`, `dot`, `norm2`
//! and operator evaluation, so it runs unchanged on any backend. It relies
//! on two documented backend conventions: `dot` returns the real part of
//! the conjugated inner product (real for the Hermitian systems solved
//! here), and `norm2` returns the squared residual norm.

use matfree_traits::operator::Operator;
use matfree_traits::types::{c32, Error, Result};
use matfree_traits::DeviceArray;

/// Outcome of a [`cg`] run.
#[derive(Clone, Copy, Debug)]
pub struct CgSummary {
    /// Iterations performed.
    pub iterations: usize,
    /// Final residual 2-norm (not squared).
    pub residual: f32,
    /// Whether the tolerance was reached within `maxiter`.
    pub converged: bool,
}

/// Solve `A x = b` for a Hermitian positive-definite operator `A`, updating
/// `x` in place from its initial guess. Allocates the four auxiliary
/// vectors the memory analyzer accounts as scratch.
pub fn cg(
    a: &dyn Operator,
    x: &DeviceArray,
    b: &DeviceArray,
    maxiter: usize,
    tol: f32,
) -> Result<CgSummary> {
    let (m, n) = a.shape();
    if m != n {
        return Err(Error::InvalidArgument(format!(
            "cg requires a square operator, got {:?}",
            a.shape()
        )));
    }
    if b.shape().1 != 1 || x.shape() != b.shape() || b.shape().0 != n {
        return Err(Error::InvalidArgument(format!(
            "cg requires single-column x and b of height {}, got x {:?}, b {:?}",
            n,
            x.shape(),
            b.shape()
        )));
    }
    let backend = a.backend();
    let one = c32::new(1.0, 0.0);
    let zero = c32::new(0.0, 0.0);

    // r = b - A x
    let r = backend.zero_array(b.shape(), b.dtype());
    r.copy_from(b)?;
    a.eval(&r, x, -one, one, true)?;

    let p = backend.zero_array(b.shape(), b.dtype());
    p.copy_from(&r)?;
    let q = backend.zero_array(b.shape(), b.dtype());

    let mut rr = backend.norm2(&r);
    let tol2 = tol * tol;
    let mut iterations = 0;

    for k in 0..maxiter {
        if rr <= tol2 {
            break;
        }
        a.eval(&q, &p, one, zero, true)?;
        let pq = backend.dot(&p, &q)?;
        if pq <= 0.0 {
            return Err(Error::Backend(format!(
                "cg breakdown at iteration {k}: p^H A p = {pq}"
            )));
        }
        let alpha = rr / pq;
        backend.axpy(x, c32::new(alpha, 0.0), &p)?;
        backend.axpy(&r, c32::new(-alpha, 0.0), &q)?;
        let rr_next = backend.norm2(&r);
        let beta = rr_next / rr;
        backend.scale(&p, c32::new(beta, 0.0));
        backend.axpy(&p, one, &r)?;
        rr = rr_next;
        iterations = k + 1;
        tracing::debug!(target: "matfree::cg", iteration = iterations, resid = rr.sqrt());
    }

    Ok(CgSummary {
        iterations,
        residual: rr.sqrt(),
        converged: rr <= tol2,
    })
}
