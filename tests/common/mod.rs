//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use matfree::{c32, Backend, CpuBackend, DeviceArray, Dtype, HostArray, OpRef, Operator};

pub fn backend() -> Arc<dyn Backend> {
    Arc::new(CpuBackend::new())
}

pub fn c(re: f32, im: f32) -> c32 {
    c32::new(re, im)
}

pub fn re(re: f32) -> c32 {
    c32::new(re, 0.0)
}

pub fn upload(backend: &Arc<dyn Backend>, shape: (usize, usize), vals: Vec<c32>) -> DeviceArray {
    backend.copy_array(&HostArray::from_vec(shape, vals).unwrap())
}

/// `A * x` with `alpha=1, beta=0`.
pub fn eval_forward(op: &OpRef, x: &DeviceArray) -> DeviceArray {
    let y = op
        .backend()
        .zero_array((op.shape().0, x.shape().1), Dtype::Complex64);
    op.eval(&y, x, re(1.0), re(0.0), true).unwrap();
    y
}

/// `A^H * x` with `alpha=1, beta=0`.
pub fn eval_adjoint(op: &OpRef, x: &DeviceArray) -> DeviceArray {
    let y = op
        .backend()
        .zero_array((op.shape().1, x.shape().1), Dtype::Complex64);
    op.eval(&y, x, re(1.0), re(0.0), false).unwrap();
    y
}

pub fn assert_allclose(got: &[c32], want: &[c32], tol: f32) {
    assert_eq!(got.len(), want.len(), "length mismatch");
    for (i, (g, w)) in got.iter().zip(want.iter()).enumerate() {
        let err = (g - w).norm();
        let scale = w.norm().max(1.0);
        assert!(
            err <= tol * scale,
            "element {i}: got {g}, want {w} (err {err})"
        );
    }
}

/// Full complex inner product `x^H y` on host data.
pub fn inner(x: &[c32], y: &[c32]) -> c32 {
    x.iter()
        .zip(y.iter())
        .map(|(a, b)| a.conj() * b)
        .sum()
}
