//! Leaf and composite linear operators.
//!
//! Leaves terminate evaluation in a backend primitive; composite nodes
//! allocate transient buffers, slice or reinterpret their operands, and
//! recurse through their children's public `eval`, so batching and checks
//! compose all the way down.

use std::sync::{Arc, Mutex, OnceLock};

use num::{One, Zero};

use matfree_traits::operator::{cap_batch, check_dtypes, NodeBase, OpRef, Operator};
use matfree_traits::types::{c32, Error, Result};
use matfree_traits::{Backend, DeviceArray, DeviceCsr, HostArray, SparseHost};

use crate::util::Profile;

fn one() -> c32 {
    c32::one()
}

fn zero() -> c32 {
    c32::zero()
}

fn check_positive(shape: (usize, usize), op: &str) -> Result<()> {
    if shape.0 == 0 || shape.1 == 0 {
        return Err(Error::InvalidShape {
            shape,
            op: op.to_string(),
        });
    }
    Ok(())
}

// ----------------------------------------------------------------------
// DenseMatrix
// ----------------------------------------------------------------------

/// Concrete column-major dense matrix, uploaded to the backend on first
/// evaluation and cached for the leaf's lifetime.
pub struct DenseMatrix {
    base: NodeBase,
    matrix: HostArray,
    device: OnceLock<DeviceArray>,
}

impl DenseMatrix {
    pub fn new(
        backend: Arc<dyn Backend>,
        matrix: HostArray,
        name: impl Into<String>,
    ) -> Result<DenseMatrix> {
        let name = name.into();
        check_positive(matrix.shape(), &name)?;
        Ok(DenseMatrix {
            base: NodeBase::new(backend, name),
            matrix,
            device: OnceLock::new(),
        })
    }

    pub fn with_batch(mut self, batch: usize) -> DenseMatrix {
        self.base.set_batch(batch);
        self
    }

    fn device(&self) -> &DeviceArray {
        self.device
            .get_or_init(|| self.base.backend.copy_array(&self.matrix))
    }
}

impl Operator for DenseMatrix {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn type_name(&self) -> &'static str {
        "DenseMatrix"
    }

    fn shape(&self) -> (usize, usize) {
        self.matrix.shape()
    }

    fn apply(
        &self,
        y: &DeviceArray,
        x: &DeviceArray,
        alpha: c32,
        beta: c32,
        forward: bool,
    ) -> Result<()> {
        let m = self.device();
        let (rows, cols) = m.shape();
        let nflops = rows * cols * x.shape().1 * 5;
        let _p = Profile::new("cgemm").nflops(nflops as f64);
        self.base.backend.cgemm(y, m, x, alpha, beta, forward)
    }

    fn data_nbytes(&self) -> usize {
        self.matrix.nbytes()
    }
}

// ----------------------------------------------------------------------
// SpMatrix
// ----------------------------------------------------------------------

/// Sparse matrix leaf. The host matrix may arrive in any supported format;
/// on first use it is canonicalized to CSR with row-sorted indices and
/// uploaded once. The adjoint reuses the same device handle through the
/// backend's conjugate-transpose flag.
pub struct SpMatrix {
    base: NodeBase,
    matrix: SparseHost,
    device: Mutex<Option<Arc<DeviceCsr>>>,
}

impl SpMatrix {
    pub fn new(
        backend: Arc<dyn Backend>,
        matrix: SparseHost,
        name: impl Into<String>,
    ) -> Result<SpMatrix> {
        let name = name.into();
        check_positive(matrix.shape(), &name)?;
        Ok(SpMatrix {
            base: NodeBase::new(backend, name),
            matrix,
            device: Mutex::new(None),
        })
    }

    pub fn with_batch(mut self, batch: usize) -> SpMatrix {
        self.base.set_batch(batch);
        self
    }

    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    fn device(&self) -> Result<Arc<DeviceCsr>> {
        let mut slot = self.device.lock().unwrap();
        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }
        let handle = Arc::new(DeviceCsr::from_host(
            Arc::clone(&self.base.backend),
            &self.matrix,
            &self.base.name,
        )?);
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    fn purpose(&self, forward: bool) -> String {
        let direction = if forward { "forward" } else { "adjoint" };
        if self.base.name.contains("interp") {
            format!("grid {direction}")
        } else if self.base.name.contains("map") {
            format!("maps {direction}")
        } else {
            "?".to_string()
        }
    }
}

impl Operator for SpMatrix {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn type_name(&self) -> &'static str {
        "SpMatrix"
    }

    fn shape(&self) -> (usize, usize) {
        self.matrix.shape()
    }

    fn apply(
        &self,
        y: &DeviceArray,
        x: &DeviceArray,
        alpha: c32,
        beta: c32,
        forward: bool,
    ) -> Result<()> {
        let m = self.device()?;
        let y_passes = if beta == zero() { 1 } else { 2 };
        let nbytes = m.nbytes() + x.nbytes() + y.nbytes() * y_passes;
        let _p = Profile::new("csrmm")
            .nbytes(nbytes)
            .nthreads(self.base.backend.get_max_threads())
            .purpose(self.purpose(forward))
            .shape(x.shape());
        if forward {
            m.forward(y, x, alpha, beta)
        } else {
            m.adjoint(y, x, alpha, beta)
        }
    }

    fn data_nbytes(&self) -> usize {
        match &self.matrix {
            SparseHost::Csr(m) => m.nbytes(),
            SparseHost::Coo(m) => m.nbytes(),
            SparseHost::Dia(m) => m.nbytes(),
            SparseHost::Dok(_) => {
                tracing::warn!(
                    name = %self.base.name,
                    "sparse format unsupported by memory analysis, contributing zero"
                );
                0
            }
        }
    }
}

// ----------------------------------------------------------------------
// UnscaledFFT
// ----------------------------------------------------------------------

/// Batched 3-D DFT over a logical `(u, v, w)` grid, unscaled in both
/// directions: the adjoint runs the backward transform without the
/// `1/(u*v*w)` factor, so `A^H A = (u*v*w) * I`. Compose a scaling
/// operator for a unitary transform.
pub struct UnscaledFFT {
    base: NodeBase,
    ft_shape: [usize; 3],
}

impl UnscaledFFT {
    pub fn new(
        backend: Arc<dyn Backend>,
        ft_shape: [usize; 3],
        name: impl Into<String>,
    ) -> Result<UnscaledFFT> {
        let name = name.into();
        if ft_shape.contains(&0) {
            let n = ft_shape.iter().product();
            return Err(Error::InvalidShape {
                shape: (n, n),
                op: name,
            });
        }
        Ok(UnscaledFFT {
            base: NodeBase::new(backend, name),
            ft_shape,
        })
    }

    pub fn with_batch(mut self, batch: usize) -> UnscaledFFT {
        self.base.set_batch(batch);
        self
    }

    pub fn ft_shape(&self) -> [usize; 3] {
        self.ft_shape
    }

    fn points(&self) -> usize {
        self.ft_shape.iter().product()
    }
}

impl Operator for UnscaledFFT {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn type_name(&self) -> &'static str {
        "UnscaledFFT"
    }

    fn shape(&self) -> (usize, usize) {
        let n = self.points();
        (n, n)
    }

    fn apply(
        &self,
        y: &DeviceArray,
        x: &DeviceArray,
        alpha: c32,
        beta: c32,
        forward: bool,
    ) -> Result<()> {
        if alpha != one() || beta != zero() {
            return Err(Error::UnsupportedScalars {
                op: format!("{} (UnscaledFFT)", self.base.name),
                alpha,
                beta,
            });
        }
        let ncols = x.shape().1;
        let n = self.points();
        let nflops = ncols as f64 * 5.0 * n as f64 * (n as f64).log2();
        let [u, v, w] = self.ft_shape;
        let _p = Profile::new("fft").nflops(nflops).shape((u, v, w, ncols));
        if forward {
            self.base.backend.fftn(y, x, self.ft_shape)
        } else {
            self.base.backend.ifftn(y, x, self.ft_shape)
        }
    }

    fn intermediate_nbytes(&self, x_shape: (usize, usize)) -> usize {
        let (_, ncols) = cap_batch(self.base.batch, x_shape);
        let [u, v, w] = self.ft_shape;
        self.base.backend.fft_workspace_size([u, v, w, ncols])
    }
}

// ----------------------------------------------------------------------
// Adjoint
// ----------------------------------------------------------------------

/// Thin wrapper evaluating its child with the direction inverted.
/// Adjoining an `Adjoint` returns the wrapped child rather than stacking.
pub struct Adjoint {
    base: NodeBase,
    children: [OpRef; 1],
}

impl Adjoint {
    pub fn new(child: OpRef) -> Adjoint {
        let name = format!("{}.H", child.name());
        let backend = Arc::clone(child.backend());
        Adjoint {
            base: NodeBase::new(backend, name),
            children: [child],
        }
    }

    pub fn child(&self) -> &OpRef {
        &self.children[0]
    }
}

impl Operator for Adjoint {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn type_name(&self) -> &'static str {
        "Adjoint"
    }

    fn shape(&self) -> (usize, usize) {
        let (m, n) = self.children[0].shape();
        (n, m)
    }

    fn children(&self) -> &[OpRef] {
        &self.children
    }

    fn unwrap_adjoint(&self) -> Option<OpRef> {
        Some(Arc::clone(&self.children[0]))
    }

    fn apply(
        &self,
        y: &DeviceArray,
        x: &DeviceArray,
        alpha: c32,
        beta: c32,
        forward: bool,
    ) -> Result<()> {
        self.children[0].eval(y, x, alpha, beta, !forward)
    }
}

// ----------------------------------------------------------------------
// Product
// ----------------------------------------------------------------------

/// Composition `L * R`. Evaluation stages through one transient buffer:
/// the scalar `alpha` is absorbed on the far side so the final
/// accumulation into `y` still honors `beta`.
pub struct Product {
    base: NodeBase,
    children: [OpRef; 2],
}

impl Product {
    pub fn new(left: OpRef, right: OpRef) -> Result<Product> {
        if left.shape().1 != right.shape().0 {
            return Err(Error::ProductShapeMismatch {
                left: left.shape(),
                right: right.shape(),
                left_name: left.name().to_string(),
                right_name: right.name().to_string(),
            });
        }
        check_dtypes("Product", &[Arc::clone(&left), Arc::clone(&right)])?;
        let name = format!("{}*{}", left.name(), right.name());
        let backend = Arc::clone(left.backend());
        Ok(Product {
            base: NodeBase::new(backend, name),
            children: [left, right],
        })
    }

    pub fn with_batch(mut self, batch: usize) -> Product {
        self.base.set_batch(batch);
        self
    }

    pub fn left(&self) -> &OpRef {
        &self.children[0]
    }

    pub fn right(&self) -> &OpRef {
        &self.children[1]
    }
}

impl Operator for Product {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn type_name(&self) -> &'static str {
        "Product"
    }

    fn shape(&self) -> (usize, usize) {
        (self.children[0].shape().0, self.children[1].shape().1)
    }

    fn children(&self) -> &[OpRef] {
        &self.children
    }

    fn apply(
        &self,
        y: &DeviceArray,
        x: &DeviceArray,
        alpha: c32,
        beta: c32,
        forward: bool,
    ) -> Result<()> {
        let [left, right] = &self.children;
        let ncols = x.shape().1;
        if forward {
            let tmp = self
                .base
                .backend
                .zero_array((right.shape().0, ncols), self.dtype());
            right.eval(&tmp, x, alpha, zero(), true)?;
            left.eval(y, &tmp, one(), beta, true)?;
        } else {
            let tmp = self
                .base
                .backend
                .zero_array((left.shape().1, ncols), self.dtype());
            left.eval(&tmp, x, alpha, zero(), false)?;
            right.eval(y, &tmp, one(), beta, false)?;
        }
        Ok(())
    }

    fn intermediate_nbytes(&self, x_shape: (usize, usize)) -> usize {
        let capped = cap_batch(self.base.batch, x_shape);
        let [left, right] = &self.children;
        let tmp = right.shape().0 * capped.1 * self.dtype().itemsize();
        let inter_shape = (right.shape().0, capped.1);
        tmp + left
            .intermediate_nbytes(inter_shape)
            .max(right.intermediate_nbytes(capped))
    }
}

// ----------------------------------------------------------------------
// KronI
// ----------------------------------------------------------------------

/// `I_c (x) child`: `c` copies of the child along the diagonal, applied by
/// reinterpreting the column-major layout rather than iterating. The
/// operands must therefore be contiguous.
pub struct KronI {
    base: NodeBase,
    c: usize,
    children: [OpRef; 1],
}

impl KronI {
    pub fn new(c: usize, child: OpRef, name: impl Into<String>) -> Result<KronI> {
        if c == 0 {
            return Err(Error::InvalidArgument(
                "KronI requires a positive replication count".into(),
            ));
        }
        let backend = Arc::clone(child.backend());
        Ok(KronI {
            base: NodeBase::new(backend, name),
            c,
            children: [child],
        })
    }

    pub fn with_batch(mut self, batch: usize) -> KronI {
        self.base.set_batch(batch);
        self
    }

    pub fn replication(&self) -> usize {
        self.c
    }
}

impl Operator for KronI {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn type_name(&self) -> &'static str {
        "KronI"
    }

    fn shape(&self) -> (usize, usize) {
        let (h, w) = self.children[0].shape();
        (self.c * h, self.c * w)
    }

    fn children(&self) -> &[OpRef] {
        &self.children
    }

    fn apply(
        &self,
        y: &DeviceArray,
        x: &DeviceArray,
        alpha: c32,
        beta: c32,
        forward: bool,
    ) -> Result<()> {
        let cb = self.c * x.shape().1;
        let xr = x.reshaped((x.size() / cb, cb))?;
        let yr = y.reshaped((y.size() / cb, cb))?;
        self.children[0].eval(&yr, &xr, alpha, beta, forward)
    }

    fn intermediate_nbytes(&self, x_shape: (usize, usize)) -> usize {
        let (rows, ncols) = cap_batch(self.base.batch, x_shape);
        let cb = self.c * ncols;
        let shape = ((rows * ncols) / cb, cb);
        self.children[0].intermediate_nbytes(shape)
    }
}

// ----------------------------------------------------------------------
// BlockDiag
// ----------------------------------------------------------------------

/// Block-diagonal composition: children tile the diagonal, each applied to
/// its own row/column slice pair with no cross-block coupling.
pub struct BlockDiag {
    base: NodeBase,
    children: Vec<OpRef>,
}

impl BlockDiag {
    pub fn new(children: Vec<OpRef>, name: impl Into<String>) -> Result<BlockDiag> {
        if children.is_empty() {
            return Err(Error::InvalidArgument(
                "BlockDiag requires at least one child".into(),
            ));
        }
        check_dtypes("BlockDiag", &children)?;
        let backend = Arc::clone(children[0].backend());
        Ok(BlockDiag {
            base: NodeBase::new(backend, name),
            children,
        })
    }

    pub fn with_batch(mut self, batch: usize) -> BlockDiag {
        self.base.set_batch(batch);
        self
    }
}

impl Operator for BlockDiag {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn type_name(&self) -> &'static str {
        "BlockDiag"
    }

    fn shape(&self) -> (usize, usize) {
        self.children
            .iter()
            .fold((0, 0), |(h, w), c| (h + c.shape().0, w + c.shape().1))
    }

    fn children(&self) -> &[OpRef] {
        &self.children
    }

    fn apply(
        &self,
        y: &DeviceArray,
        x: &DeviceArray,
        alpha: c32,
        beta: c32,
        forward: bool,
    ) -> Result<()> {
        let mut h_offset = 0;
        let mut w_offset = 0;
        for child in &self.children {
            let (ch, cw) = child.shape();
            let (h, w) = if forward { (ch, cw) } else { (cw, ch) };
            let y_slc = y.slice_rows(h_offset..h_offset + h);
            let x_slc = x.slice_rows(w_offset..w_offset + w);
            child.eval(&y_slc, &x_slc, alpha, beta, forward)?;
            h_offset += h;
            w_offset += w;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------
// VStack / HStack
// ----------------------------------------------------------------------

/// Vertical concatenation: forward writes each child into a row slice of
/// `y`; the adjoint is a sum, realized by scaling `y` by `beta` once and
/// accumulating children with `beta = 1`.
pub struct VStack {
    base: NodeBase,
    children: Vec<OpRef>,
}

impl VStack {
    pub fn new(children: Vec<OpRef>, name: impl Into<String>) -> Result<VStack> {
        if children.is_empty() {
            return Err(Error::InvalidArgument(
                "VStack requires at least one child".into(),
            ));
        }
        let widths: Vec<usize> = children.iter().map(|c| c.shape().1).collect();
        if widths.windows(2).any(|w| w[0] != w[1]) {
            let entries: Vec<(usize, &str)> = children
                .iter()
                .map(|c| (c.shape().1, c.name()))
                .collect();
            return Err(Error::StackMismatch {
                op: "VStack",
                axis: "width",
                entries: format!("{entries:?}"),
            });
        }
        check_dtypes("VStack", &children)?;
        let backend = Arc::clone(children[0].backend());
        Ok(VStack {
            base: NodeBase::new(backend, name),
            children,
        })
    }

    pub fn with_batch(mut self, batch: usize) -> VStack {
        self.base.set_batch(batch);
        self
    }
}

impl Operator for VStack {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn type_name(&self) -> &'static str {
        "VStack"
    }

    fn shape(&self) -> (usize, usize) {
        let h = self.children.iter().map(|c| c.shape().0).sum();
        (h, self.children[0].shape().1)
    }

    fn children(&self) -> &[OpRef] {
        &self.children
    }

    fn apply(
        &self,
        y: &DeviceArray,
        x: &DeviceArray,
        alpha: c32,
        beta: c32,
        forward: bool,
    ) -> Result<()> {
        if forward {
            let mut h_offset = 0;
            for child in &self.children {
                let h = child.shape().0;
                let y_slc = y.slice_rows(h_offset..h_offset + h);
                child.eval(&y_slc, x, alpha, beta, true)?;
                h_offset += h;
            }
        } else {
            // One-shot pre-scale; per-child beta would over-attenuate.
            self.base.backend.scale(y, beta);
            let mut h_offset = 0;
            for child in &self.children {
                let h = child.shape().0;
                let x_slc = x.slice_rows(h_offset..h_offset + h);
                child.eval(y, &x_slc, alpha, one(), false)?;
                h_offset += h;
            }
        }
        Ok(())
    }
}

/// Horizontal concatenation, the dual of [`VStack`]: forward accumulates
/// into the full `y` after a one-shot `beta` scale; the adjoint scatters
/// into row slices of `y`.
pub struct HStack {
    base: NodeBase,
    children: Vec<OpRef>,
}

impl HStack {
    pub fn new(children: Vec<OpRef>, name: impl Into<String>) -> Result<HStack> {
        if children.is_empty() {
            return Err(Error::InvalidArgument(
                "HStack requires at least one child".into(),
            ));
        }
        let heights: Vec<usize> = children.iter().map(|c| c.shape().0).collect();
        if heights.windows(2).any(|w| w[0] != w[1]) {
            let entries: Vec<(usize, &str)> = children
                .iter()
                .map(|c| (c.shape().0, c.name()))
                .collect();
            return Err(Error::StackMismatch {
                op: "HStack",
                axis: "height",
                entries: format!("{entries:?}"),
            });
        }
        check_dtypes("HStack", &children)?;
        let backend = Arc::clone(children[0].backend());
        Ok(HStack {
            base: NodeBase::new(backend, name),
            children,
        })
    }

    pub fn with_batch(mut self, batch: usize) -> HStack {
        self.base.set_batch(batch);
        self
    }
}

impl Operator for HStack {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn type_name(&self) -> &'static str {
        "HStack"
    }

    fn shape(&self) -> (usize, usize) {
        let w = self.children.iter().map(|c| c.shape().1).sum();
        (self.children[0].shape().0, w)
    }

    fn children(&self) -> &[OpRef] {
        &self.children
    }

    fn apply(
        &self,
        y: &DeviceArray,
        x: &DeviceArray,
        alpha: c32,
        beta: c32,
        forward: bool,
    ) -> Result<()> {
        if forward {
            self.base.backend.scale(y, beta);
            let mut w_offset = 0;
            for child in &self.children {
                let w = child.shape().1;
                let x_slc = x.slice_rows(w_offset..w_offset + w);
                child.eval(y, &x_slc, alpha, one(), true)?;
                w_offset += w;
            }
        } else {
            let mut w_offset = 0;
            for child in &self.children {
                let w = child.shape().1;
                let y_slc = y.slice_rows(w_offset..w_offset + w);
                child.eval(&y_slc, x, alpha, beta, false)?;
                w_offset += w;
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Composition surface
// ----------------------------------------------------------------------

/// Composition helpers on shared operator handles.
pub trait OperatorExt {
    /// The adjoint. Adjoining an adjoint returns the original node.
    fn h(&self) -> OpRef;

    /// `self * other` as a [`Product`].
    fn times(&self, other: OpRef) -> Result<OpRef>;
}

impl OperatorExt for OpRef {
    fn h(&self) -> OpRef {
        match self.unwrap_adjoint() {
            Some(child) => child,
            None => Arc::new(Adjoint::new(Arc::clone(self))),
        }
    }

    fn times(&self, other: OpRef) -> Result<OpRef> {
        Ok(Arc::new(Product::new(Arc::clone(self), other)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use matfree_backend::CpuBackend;
    use matfree_traits::{CsrHost, Dtype};

    fn backend() -> Arc<dyn Backend> {
        Arc::new(CpuBackend::new())
    }

    fn eye(backend: &Arc<dyn Backend>, n: usize, name: &str) -> OpRef {
        Arc::new(
            SpMatrix::new(
                Arc::clone(backend),
                SparseHost::Csr(CsrHost::identity(n)),
                name,
            )
            .unwrap(),
        )
    }

    #[test]
    fn product_rejects_mismatched_inner_dims() {
        let b = backend();
        let a = eye(&b, 2, "A");
        let c = eye(&b, 3, "B");
        assert!(matches!(
            Product::new(a, c),
            Err(Error::ProductShapeMismatch { .. })
        ));
    }

    #[test]
    fn stacks_reject_mismatched_children() {
        let b = backend();
        assert!(matches!(
            VStack::new(vec![eye(&b, 2, "a"), eye(&b, 3, "b")], ""),
            Err(Error::StackMismatch { axis: "width", .. })
        ));
        assert!(matches!(
            HStack::new(vec![eye(&b, 2, "a"), eye(&b, 3, "b")], ""),
            Err(Error::StackMismatch { axis: "height", .. })
        ));
    }

    #[test]
    fn double_adjoint_is_the_original_node() {
        let b = backend();
        let a = eye(&b, 2, "A");
        let ah = a.h();
        assert_eq!(ah.type_name(), "Adjoint");
        assert_eq!(ah.name(), "A.H");
        let ahh = ah.h();
        assert!(Arc::ptr_eq(&a, &ahh));
    }

    #[test]
    fn shapes_compose() {
        let b = backend();
        let dense = Arc::new(
            DenseMatrix::new(Arc::clone(&b), HostArray::zeros((2, 3)), "D").unwrap(),
        ) as OpRef;
        let sp = eye(&b, 3, "S");
        let p = dense.times(Arc::clone(&sp)).unwrap();
        assert_eq!(p.shape(), (2, 3));
        assert_eq!(p.name(), "D*S");

        let k = Arc::new(KronI::new(2, Arc::clone(&dense), "K").unwrap()) as OpRef;
        assert_eq!(k.shape(), (4, 6));

        let bd = Arc::new(BlockDiag::new(vec![dense, sp], "B").unwrap()) as OpRef;
        assert_eq!(bd.shape(), (5, 6));
    }

    #[test]
    fn dump_renders_the_tree() {
        let b = backend();
        let s = eye(&b, 2, "S");
        let p = s.times(eye(&b, 2, "")).unwrap();
        let text = p.dump();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "S*, Product, (2, 2), complex64");
        assert_eq!(lines[1], "|   S, SpMatrix, (2, 2), complex64");
        assert_eq!(lines[2], "|   noname, SpMatrix, (2, 2), complex64");
    }

    #[test]
    fn fft_rejects_general_scalars() {
        let b = backend();
        let f = Arc::new(UnscaledFFT::new(Arc::clone(&b), [2, 2, 2], "F").unwrap()) as OpRef;
        let x = b.zero_array((8, 1), Dtype::Complex64);
        let y = b.zero_array((8, 1), Dtype::Complex64);
        let err = f.eval(&y, &x, c32::new(2.0, 0.0), zero(), true);
        assert!(matches!(err, Err(Error::UnsupportedScalars { .. })));
    }

    #[test]
    fn eval_reports_dimension_mismatch() {
        let b = backend();
        let a = eye(&b, 3, "A");
        let x = b.zero_array((2, 1), Dtype::Complex64);
        let y = b.zero_array((3, 1), Dtype::Complex64);
        let err = a.eval(&y, &x, one(), zero(), true).unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }
}
