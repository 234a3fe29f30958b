//! Profiling instrumentation and random test-data helpers.

use std::time::Instant;

use rand::Rng;

use matfree_traits::types::c32;
use matfree_traits::{CsrHost, HostArray};

/// Scoped profiling guard. On drop it emits one record through `tracing`
/// at debug level, with keys sorted and throughput rates derived from the
/// raw counters:
///
/// `PROFILE(duration=…, event=…, gflop_rate=…, nflops=…, …)`
pub struct Profile {
    event: &'static str,
    start: Instant,
    nflops: Option<f64>,
    nbytes: Option<usize>,
    nthreads: Option<usize>,
    purpose: Option<String>,
    shape: Option<String>,
}

impl Profile {
    pub fn new(event: &'static str) -> Profile {
        Profile {
            event,
            start: Instant::now(),
            nflops: None,
            nbytes: None,
            nthreads: None,
            purpose: None,
            shape: None,
        }
    }

    pub fn nflops(mut self, nflops: f64) -> Profile {
        self.nflops = Some(nflops);
        self
    }

    pub fn nbytes(mut self, nbytes: usize) -> Profile {
        self.nbytes = Some(nbytes);
        self
    }

    pub fn nthreads(mut self, nthreads: usize) -> Profile {
        self.nthreads = Some(nthreads);
        self
    }

    pub fn purpose(mut self, purpose: impl Into<String>) -> Profile {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn shape(mut self, shape: impl std::fmt::Debug) -> Profile {
        self.shape = Some(format!("{shape:?}"));
        self
    }

    fn render(&self, duration: f64) -> String {
        let mut fields: Vec<(&'static str, String)> = vec![
            ("duration", format!("{duration:.6}")),
            ("event", self.event.to_string()),
        ];
        if let Some(nflops) = self.nflops {
            fields.push(("nflops", format!("{nflops}")));
            fields.push(("gflop_rate", format!("{}", nflops / duration * 1e-9)));
        }
        if let Some(nbytes) = self.nbytes {
            fields.push(("nbytes", format!("{nbytes}")));
            fields.push(("membw_rate", format!("{}", nbytes as f64 / duration * 1e-9)));
        }
        if let Some(nthreads) = self.nthreads {
            fields.push(("nthreads", format!("{nthreads}")));
        }
        if let Some(purpose) = &self.purpose {
            fields.push(("purpose", format!("'{purpose}'")));
        }
        if let Some(shape) = &self.shape {
            fields.push(("shape", shape.clone()));
        }
        fields.sort_by_key(|(k, _)| *k);
        let body: Vec<String> = fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("PROFILE({})", body.join(", "))
    }
}

impl Drop for Profile {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        tracing::debug!(target: "matfree::profile", "{}", self.render(duration));
    }
}

/// Accumulating timer for repeated measurements.
#[derive(Default)]
pub struct Timer {
    times: Vec<f64>,
}

impl Timer {
    pub fn new() -> Timer {
        Timer::default()
    }

    /// Run `f`, recording its wall time.
    pub fn time<R>(&mut self, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let out = f();
        self.times.push(start.elapsed().as_secs_f64());
        out
    }

    pub fn count(&self) -> usize {
        self.times.len()
    }

    pub fn mean(&self) -> f64 {
        if self.times.is_empty() {
            return 0.0;
        }
        self.times.iter().sum::<f64>() / self.times.len() as f64
    }

    pub fn median(&self) -> f64 {
        if self.times.is_empty() {
            return 0.0;
        }
        let mut sorted = self.times.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted[sorted.len() / 2]
    }

    pub fn min(&self) -> f64 {
        self.times.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.times.iter().copied().fold(0.0, f64::max)
    }
}

/// Random complex64 column-major matrix with entries in the unit square.
pub fn rand64c(shape: (usize, usize)) -> HostArray {
    let mut rng = rand::thread_rng();
    let data: Vec<c32> = (0..shape.0 * shape.1)
        .map(|_| c32::new(rng.gen::<f32>(), rng.gen::<f32>()))
        .collect();
    HostArray::from_vec(shape, data).expect("length matches by construction")
}

/// Random complex64 CSR matrix of the requested density.
pub fn rand_csr(shape: (usize, usize), density: f64) -> CsrHost {
    let mut rng = rand::thread_rng();
    let (m, n) = shape;
    let mut data = Vec::new();
    let mut indices = Vec::new();
    let mut indptr = Vec::with_capacity(m + 1);
    indptr.push(0i32);
    for _ in 0..m {
        for j in 0..n {
            if rng.gen::<f64>() < density {
                indices.push(j as i32);
                data.push(c32::new(rng.gen::<f32>(), rng.gen::<f32>()));
            }
        }
        indptr.push(indices.len() as i32);
    }
    CsrHost::new(shape, data, indices, indptr).expect("indices are in bounds by construction")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn profile_record_sorts_keys_and_derives_rates() {
        let p = Profile::new("cgemm").nflops(2e9).nbytes(1_000_000);
        let record = p.render(1.0);
        assert!(record.starts_with("PROFILE(duration="));
        let gflop = record.find("gflop_rate=2").unwrap();
        let nbytes = record.find("nbytes=1000000").unwrap();
        let membw = record.find("membw_rate=0.001").unwrap();
        assert!(gflop < membw && membw < nbytes);
    }

    #[test]
    fn timer_stats() {
        let mut t = Timer::new();
        for _ in 0..3 {
            t.time(|| std::hint::black_box(1 + 1));
        }
        assert_eq!(t.count(), 3);
        assert!(t.min() <= t.median() && t.median() <= t.max());
        assert!(t.mean() >= 0.0);
    }

    #[test]
    fn rand_csr_is_valid() {
        let m = rand_csr((8, 5), 0.5);
        assert_eq!(m.shape, (8, 5));
        assert!(m.has_sorted_indices());
        assert_eq!(m.indptr.len(), 9);
    }

    #[test]
    fn rand64c_has_requested_shape() {
        let a = rand64c((3, 4));
        assert_eq!(a.shape(), (3, 4));
        assert_eq!(a.size(), 12);
    }
}
