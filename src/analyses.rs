//! Static memory-usage analysis.
//!
//! Bounds the peak working set of evaluating a tree during a CG-style
//! solve, before any evaluation happens. The estimate is a deliberate
//! over-approximation: sibling intermediates along a branch are assumed to
//! coexist, which matches the evaluator's actual allocation pattern.

use std::collections::HashMap;

use matfree_traits::operator::{walk, Operator};
use matfree_traits::types::Dtype;

const MIB: f64 = 1024.0 * 1024.0;

/// Estimated footprint in MiB.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemEstimate {
    /// Concrete matrix storage, leaves deduplicated by identity.
    pub data_mib: f64,
    /// Peak transient buffers along the worst evaluation branch.
    pub intermediate_mib: f64,
    /// Solver auxiliary vectors (four per right-hand side).
    pub scratch_mib: f64,
}

impl MemEstimate {
    pub fn total_mib(&self) -> f64 {
        self.data_mib + self.intermediate_mib + self.scratch_mib
    }
}

/// Memory-usage analyzer over an operator tree.
pub struct Memusage;

impl Memusage {
    /// Raw byte counts `(data, intermediate, scratch)` for evaluating
    /// `root` on `ncols` right-hand-side columns.
    pub fn estimate_nbytes(root: &dyn Operator, ncols: usize) -> (usize, usize, usize) {
        // Shared leaves are keyed by node address, not structure: the same
        // matrix referenced twice is stored once.
        let mut data_items: HashMap<usize, usize> = HashMap::new();
        walk(root, &mut |node| {
            let nbytes = node.data_nbytes();
            if nbytes > 0 {
                let key = node as *const dyn Operator as *const () as usize;
                data_items.insert(key, nbytes);
            }
        });
        let data: usize = data_items.values().sum();

        let x_shape = (root.shape().1, ncols);
        let intermediate = root.intermediate_nbytes(x_shape);

        let scratch = 4 * x_shape.0 * x_shape.1 * Dtype::Complex64.itemsize();
        (data, intermediate, scratch)
    }

    /// The three quantities in MiB.
    pub fn estimate(root: &dyn Operator, ncols: usize) -> MemEstimate {
        let (data, intermediate, scratch) = Memusage::estimate_nbytes(root, ncols);
        MemEstimate {
            data_mib: data as f64 / MIB,
            intermediate_mib: intermediate as f64 / MIB,
            scratch_mib: scratch as f64 / MIB,
        }
    }
}
