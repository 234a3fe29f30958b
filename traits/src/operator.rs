//! The operator capability and its evaluation driver.
//!
//! An operator is a node in a tree of linear maps over complex64 column
//! batches. The public entry point is [`Operator::eval`], which checks
//! shapes and dtypes, splits the column axis into batches, and hands
//! contiguous column slices to the node's [`Operator::apply`].

use std::fmt::Write as _;
use std::sync::Arc;

use crate::arrays::{DeviceArray, HostArray};
use crate::backend::Backend;
use crate::types::{c32, Dtype, Error, Result};

/// Shared reference to a tree node. Leaves may appear in several trees (or
/// several times in one tree); identity is the `Arc` address.
pub type OpRef = Arc<dyn Operator>;

/// Fields common to every node.
pub struct NodeBase {
    pub backend: Arc<dyn Backend>,
    pub name: String,
    pub batch: Option<usize>,
}

impl NodeBase {
    pub fn new(backend: Arc<dyn Backend>, name: impl Into<String>) -> NodeBase {
        NodeBase {
            backend,
            name: name.into(),
            batch: None,
        }
    }

    pub fn set_batch(&mut self, batch: usize) {
        assert!(batch > 0, "batch must be a positive column count");
        self.batch = Some(batch);
    }
}

pub trait Operator: Send + Sync {
    /// Common node fields; the accessors below read through this.
    fn base(&self) -> &NodeBase;

    /// Node variant name as shown by `dump`.
    fn type_name(&self) -> &'static str;

    /// `(rows, cols)` of the linear map, both positive.
    fn shape(&self) -> (usize, usize);

    /// Ordered children; empty for leaves.
    fn children(&self) -> &[OpRef] {
        &[]
    }

    /// Node-level kernel: `y <- alpha * op(x) + beta * y` on column slices
    /// whose width the driver has already capped at `batch`.
    ///
    /// `y` and `x` must not alias.
    fn apply(
        &self,
        y: &DeviceArray,
        x: &DeviceArray,
        alpha: c32,
        beta: c32,
        forward: bool,
    ) -> Result<()>;

    /// For `Adjoint` wrappers, the wrapped child; used so that re-adjoining
    /// collapses to the original node instead of stacking wrappers.
    fn unwrap_adjoint(&self) -> Option<OpRef> {
        None
    }

    fn backend(&self) -> &Arc<dyn Backend> {
        &self.base().backend
    }

    fn name(&self) -> &str {
        &self.base().name
    }

    /// Cap on columns processed per backend call.
    fn batch(&self) -> Option<usize> {
        self.base().batch
    }

    fn dtype(&self) -> Dtype {
        Dtype::Complex64
    }

    // ------------------------------------------------------------------
    // Evaluation driver
    // ------------------------------------------------------------------

    /// `y <- alpha * A * x + beta * y`, or the adjoint `A^H` when
    /// `forward` is false.
    ///
    /// `y` and `x` must not alias. 1-D inputs are expected to arrive as
    /// single-column arrays.
    fn eval(
        &self,
        y: &DeviceArray,
        x: &DeviceArray,
        alpha: c32,
        beta: c32,
        forward: bool,
    ) -> Result<()> {
        let shape = self.shape();
        let (m, n) = if forward { shape } else { (shape.1, shape.0) };
        if x.shape().0 != n || y.shape().0 != m || x.shape().1 != y.shape().1 {
            return Err(Error::DimensionMismatch {
                y_shape: y.shape(),
                op_shape: (m, n),
                x_shape: x.shape(),
                forward,
                op: format!("{} ({})", self.name(), self.type_name()),
            });
        }
        if x.dtype() != self.dtype() || y.dtype() != self.dtype() {
            return Err(Error::DtypeMismatch {
                y: y.dtype(),
                op: self.dtype(),
                x: x.dtype(),
            });
        }

        let ncols = x.shape().1;
        let step = self.batch().unwrap_or(ncols).max(1);
        let mut b = 0;
        while b < ncols {
            let e = (b + step).min(ncols);
            self.apply(
                &y.slice_cols(b..e),
                &x.slice_cols(b..e),
                alpha,
                beta,
                forward,
            )?;
            b = e;
        }
        Ok(())
    }

    /// Convenience path for host data: upload `x`, evaluate forward with
    /// `alpha=1, beta=0`, download the result.
    fn apply_host(&self, x: &HostArray) -> Result<HostArray> {
        tracing::warn!("using slow host evaluation interface");
        let n = self.shape().1;
        if x.size() % n != 0 {
            return Err(Error::InvalidArgument(format!(
                "host input of {} elements is not a column batch for width {}",
                x.size(),
                n
            )));
        }
        let ncols = x.size() / n;
        let x_d = self.backend().copy_array(&x.with_shape((n, ncols))?);
        let y_d = self.backend().zero_array((self.shape().0, ncols), self.dtype());
        self.eval(&y_d, &x_d, c32::new(1.0, 0.0), c32::new(0.0, 0.0), true)?;
        Ok(y_d.to_host_array())
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Textual rendering of the tree, one line per node.
    fn dump(&self) -> String {
        let mut out = String::new();
        self.write_dump(&mut out, 0);
        out
    }

    fn write_dump(&self, out: &mut String, indent: usize) {
        let name = if self.name().is_empty() {
            "noname"
        } else {
            self.name()
        };
        let _ = writeln!(
            out,
            "{}{}, {}, {:?}, {}",
            "|   ".repeat(indent),
            name,
            self.type_name(),
            self.shape(),
            self.dtype()
        );
        for child in self.children() {
            child.write_dump(out, indent + 1);
        }
    }

    // ------------------------------------------------------------------
    // Memory-analysis hooks (dispatched per node variant)
    // ------------------------------------------------------------------

    /// Bytes of concrete matrix data held by this node; zero for
    /// composites and data-free leaves.
    fn data_nbytes(&self) -> usize {
        0
    }

    /// Peak transient bytes for evaluating this subtree on an `x_shape`
    /// column block. The default covers nodes that allocate nothing
    /// themselves: the worst child at the current shape.
    fn intermediate_nbytes(&self, x_shape: (usize, usize)) -> usize {
        let shape = cap_batch(self.batch(), x_shape);
        self.children()
            .iter()
            .map(|c| c.intermediate_nbytes(shape))
            .max()
            .unwrap_or(0)
    }
}

/// Cap the column count of `x_shape` at the node's batch size.
pub fn cap_batch(batch: Option<usize>, x_shape: (usize, usize)) -> (usize, usize) {
    match batch {
        Some(b) => (x_shape.0, x_shape.1.min(b)),
        None => x_shape,
    }
}

/// Depth-first walk over a tree, parents before children.
pub fn walk<'a>(op: &'a dyn Operator, f: &mut dyn FnMut(&'a dyn Operator)) {
    f(op);
    for child in op.children() {
        walk(child.as_ref(), f);
    }
}

/// Check that `children` agree on a single dtype, as composite
/// construction requires.
pub fn check_dtypes(op: &str, children: &[OpRef]) -> Result<Dtype> {
    let mut dtypes: Vec<Dtype> = children.iter().map(|c| c.dtype()).collect();
    dtypes.dedup();
    if dtypes.len() == 1 {
        Ok(dtypes[0])
    } else {
        Err(Error::InconsistentDtypes {
            op: op.to_string(),
            dtypes,
        })
    }
}
