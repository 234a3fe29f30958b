//! Batched 3-D FFT with a committed-once plan cache.
//!
//! A plan is keyed by `(shape[:3], dtype, axes)` and holds forward and
//! inverse 1-D plans for the three leading axes. The batch count is derived
//! from the array size at execution time, so one plan serves any column
//! count. Transforms are unscaled in both directions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rustfft::{Fft, FftPlanner};

use matfree_traits::types::{c32, Dtype, Error, Result};
use matfree_traits::DeviceArray;

#[derive(Clone, PartialEq, Eq, Hash)]
struct PlanKey {
    shape: [usize; 3],
    dtype: Dtype,
    axes: [usize; 3],
}

pub(crate) struct FftPlan {
    shape: [usize; 3],
    forward: [Arc<dyn Fft<f32>>; 3],
    inverse: [Arc<dyn Fft<f32>>; 3],
}

impl FftPlan {
    fn new(planner: &mut FftPlanner<f32>, shape: [usize; 3]) -> FftPlan {
        let forward = [
            planner.plan_fft_forward(shape[0]),
            planner.plan_fft_forward(shape[1]),
            planner.plan_fft_forward(shape[2]),
        ];
        let inverse = [
            planner.plan_fft_inverse(shape[0]),
            planner.plan_fft_inverse(shape[1]),
            planner.plan_fft_inverse(shape[2]),
        ];
        FftPlan {
            shape,
            forward,
            inverse,
        }
    }

    /// Bytes of transient storage `execute` allocates: one gather line of
    /// the longest axis plus the largest in-place scratch any axis plan
    /// requests.
    pub(crate) fn workspace_nbytes(&self) -> usize {
        let line = self.shape.iter().copied().max().unwrap_or(1);
        let scratch = self
            .forward
            .iter()
            .chain(self.inverse.iter())
            .map(|p| p.get_inplace_scratch_len())
            .max()
            .unwrap_or(0);
        (line + scratch) * Dtype::Complex64.itemsize()
    }

    /// Out-of-place batched transform: copy `x` into `y`, then transform
    /// `y` along the three leading axes.
    pub(crate) fn execute(&self, y: &DeviceArray, x: &DeviceArray, inverse: bool) -> Result<()> {
        let [u, v, w] = self.shape;
        let uvw = u * v * w;
        for arr in [x, y] {
            if !arr.is_contiguous() {
                return Err(Error::NonContiguous {
                    shape: arr.shape(),
                    ld: arr.leading_dim(),
                });
            }
        }
        if x.shape() != y.shape() || x.size() % uvw != 0 {
            return Err(Error::Backend(format!(
                "fft batch mismatch: {:?} -> {:?} for transform shape {:?}",
                x.shape(),
                y.shape(),
                self.shape
            )));
        }
        let batch = x.size() / uvw;
        y.copy_from(x)?;

        let plans = if inverse { &self.inverse } else { &self.forward };
        let scratch_len = plans
            .iter()
            .map(|p| p.get_inplace_scratch_len())
            .max()
            .unwrap_or(0);
        let mut scratch = vec![c32::new(0.0, 0.0); scratch_len];
        let mut line = vec![c32::new(0.0, 0.0); u.max(v).max(w)];

        // Safety: `y` is contiguous and exclusively ours for the call.
        let buf =
            unsafe { std::slice::from_raw_parts_mut(y.as_mut_ptr(), y.size()) };

        // Axis 0: lines are contiguous runs of length u.
        plans[0].process_with_scratch(buf, &mut scratch);

        // Axis 1: stride u within a (u, v) panel.
        for t in 0..batch * w {
            let panel = t * u * v;
            for i in 0..u {
                for j in 0..v {
                    line[j] = buf[panel + i + u * j];
                }
                plans[1].process_with_scratch(&mut line[..v], &mut scratch);
                for j in 0..v {
                    buf[panel + i + u * j] = line[j];
                }
            }
        }

        // Axis 2: stride u*v within a (u, v, w) block.
        for t in 0..batch {
            let block = t * uvw;
            for j in 0..v {
                for i in 0..u {
                    for k in 0..w {
                        line[k] = buf[block + i + u * j + u * v * k];
                    }
                    plans[2].process_with_scratch(&mut line[..w], &mut scratch);
                    for k in 0..w {
                        buf[block + i + u * j + u * v * k] = line[k];
                    }
                }
            }
        }
        Ok(())
    }
}

/// Plan cache for the lifetime of the backend. Creation is serialized by
/// the cache lock, so each key is planned exactly once.
pub(crate) struct PlanCache {
    inner: Mutex<PlanCacheInner>,
}

struct PlanCacheInner {
    planner: FftPlanner<f32>,
    plans: HashMap<PlanKey, Arc<FftPlan>>,
}

impl PlanCache {
    pub(crate) fn new() -> PlanCache {
        PlanCache {
            inner: Mutex::new(PlanCacheInner {
                planner: FftPlanner::new(),
                plans: HashMap::new(),
            }),
        }
    }

    pub(crate) fn get(&self, shape: [usize; 3]) -> Arc<FftPlan> {
        let key = PlanKey {
            shape,
            dtype: Dtype::Complex64,
            axes: [0, 1, 2],
        };
        let mut inner = self.inner.lock().unwrap();
        if let Some(plan) = inner.plans.get(&key) {
            return Arc::clone(plan);
        }
        let plan = Arc::new(FftPlan::new(&mut inner.planner, shape));
        inner.plans.insert(key, Arc::clone(&plan));
        plan
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap().plans.len()
    }
}
