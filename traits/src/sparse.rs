//! Host sparse formats and the device-side CSR handle.
//!
//! CSR is the canonical device format: every host format converts to CSR on
//! upload, and indices are sorted within each row before first use. The
//! index base of the device handle is backend-specific.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::Backend;
use crate::types::{c32, Dtype, Error, Result};
use crate::DeviceArray;

/// Compressed sparse row matrix on the host.
#[derive(Clone, Debug)]
pub struct CsrHost {
    pub shape: (usize, usize),
    pub data: Vec<c32>,
    pub indices: Vec<i32>,
    pub indptr: Vec<i32>,
}

impl CsrHost {
    pub fn new(
        shape: (usize, usize),
        data: Vec<c32>,
        indices: Vec<i32>,
        indptr: Vec<i32>,
    ) -> Result<CsrHost> {
        let (m, n) = shape;
        if indptr.len() != m + 1 {
            return Err(Error::InvalidSparse(format!(
                "indptr length {} does not match {} rows",
                indptr.len(),
                m
            )));
        }
        if indptr[0] != 0 || indptr.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::InvalidSparse("indptr must start at 0 and be nondecreasing".into()));
        }
        let nnz = indptr[m] as usize;
        if data.len() != nnz || indices.len() != nnz {
            return Err(Error::InvalidSparse(format!(
                "nnz {} disagrees with data/indices lengths {}/{}",
                nnz,
                data.len(),
                indices.len()
            )));
        }
        if indices.iter().any(|&j| j < 0 || j as usize >= n) {
            return Err(Error::InvalidSparse(format!(
                "column index out of bounds for {} columns",
                n
            )));
        }
        Ok(CsrHost {
            shape,
            data,
            indices,
            indptr,
        })
    }

    /// Identity matrix in CSR form.
    pub fn identity(n: usize) -> CsrHost {
        CsrHost {
            shape: (n, n),
            data: vec![c32::new(1.0, 0.0); n],
            indices: (0..n as i32).collect(),
            indptr: (0..=n as i32).collect(),
        }
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    pub fn nbytes(&self) -> usize {
        self.data.len() * Dtype::Complex64.itemsize()
            + (self.indices.len() + self.indptr.len()) * std::mem::size_of::<i32>()
    }

    /// Whether column indices are sorted within every row.
    pub fn has_sorted_indices(&self) -> bool {
        (0..self.shape.0).all(|i| {
            let row = &self.indices[self.indptr[i] as usize..self.indptr[i + 1] as usize];
            row.windows(2).all(|w| w[0] <= w[1])
        })
    }

    /// Sort column indices within each row, carrying values along.
    pub fn sort_indices(&mut self) {
        for i in 0..self.shape.0 {
            let lo = self.indptr[i] as usize;
            let hi = self.indptr[i + 1] as usize;
            let mut order: Vec<usize> = (lo..hi).collect();
            order.sort_by_key(|&p| self.indices[p]);
            let cols: Vec<i32> = order.iter().map(|&p| self.indices[p]).collect();
            let vals: Vec<c32> = order.iter().map(|&p| self.data[p]).collect();
            self.indices[lo..hi].copy_from_slice(&cols);
            self.data[lo..hi].copy_from_slice(&vals);
        }
    }
}

/// Coordinate-format sparse matrix on the host.
#[derive(Clone, Debug)]
pub struct CooHost {
    pub shape: (usize, usize),
    pub row: Vec<i32>,
    pub col: Vec<i32>,
    pub data: Vec<c32>,
}

impl CooHost {
    pub fn new(
        shape: (usize, usize),
        row: Vec<i32>,
        col: Vec<i32>,
        data: Vec<c32>,
    ) -> Result<CooHost> {
        if row.len() != data.len() || col.len() != data.len() {
            return Err(Error::InvalidSparse("row/col/data lengths disagree".into()));
        }
        if row.iter().any(|&i| i < 0 || i as usize >= shape.0)
            || col.iter().any(|&j| j < 0 || j as usize >= shape.1)
        {
            return Err(Error::InvalidSparse("coordinate out of bounds".into()));
        }
        Ok(CooHost {
            shape,
            row,
            col,
            data,
        })
    }

    pub fn nbytes(&self) -> usize {
        self.data.len() * Dtype::Complex64.itemsize()
            + (self.row.len() + self.col.len()) * std::mem::size_of::<i32>()
    }

    pub fn to_csr(&self) -> CsrHost {
        let m = self.shape.0;
        let mut counts = vec![0i32; m + 1];
        for &i in &self.row {
            counts[i as usize + 1] += 1;
        }
        for i in 0..m {
            counts[i + 1] += counts[i];
        }
        let indptr = counts.clone();
        let nnz = self.data.len();
        let mut indices = vec![0i32; nnz];
        let mut data = vec![c32::new(0.0, 0.0); nnz];
        let mut next = counts;
        for p in 0..nnz {
            let i = self.row[p] as usize;
            let q = next[i] as usize;
            indices[q] = self.col[p];
            data[q] = self.data[p];
            next[i] += 1;
        }
        let mut csr = CsrHost {
            shape: self.shape,
            data,
            indices,
            indptr,
        };
        csr.sort_indices();
        csr
    }
}

/// Diagonal-format sparse matrix on the host.
///
/// `data` stores one row per diagonal (row-major, `shape.1` entries each);
/// entry `(k, j)` holds the matrix value at `(j - offsets[k], j)`.
#[derive(Clone, Debug)]
pub struct DiaHost {
    pub shape: (usize, usize),
    pub offsets: Vec<i32>,
    pub data: Vec<c32>,
}

impl DiaHost {
    pub fn new(shape: (usize, usize), offsets: Vec<i32>, data: Vec<c32>) -> Result<DiaHost> {
        if data.len() != offsets.len() * shape.1 {
            return Err(Error::InvalidSparse(format!(
                "dia data length {} does not match {} diagonals of {} entries",
                data.len(),
                offsets.len(),
                shape.1
            )));
        }
        Ok(DiaHost {
            shape,
            offsets,
            data,
        })
    }

    pub fn nbytes(&self) -> usize {
        self.data.len() * Dtype::Complex64.itemsize()
            + self.offsets.len() * std::mem::size_of::<i32>()
    }

    pub fn to_csr(&self) -> CsrHost {
        let (m, n) = self.shape;
        let mut rows: BTreeMap<(usize, usize), c32> = BTreeMap::new();
        for (k, &off) in self.offsets.iter().enumerate() {
            for j in 0..n {
                let i = j as i64 - off as i64;
                if i >= 0 && (i as usize) < m {
                    let v = self.data[k * n + j];
                    if v != c32::new(0.0, 0.0) {
                        rows.insert((i as usize, j), v);
                    }
                }
            }
        }
        from_sorted_entries(self.shape, rows)
    }
}

/// Dictionary-of-keys sparse matrix, a construction-only format.
#[derive(Clone, Debug, Default)]
pub struct DokHost {
    pub shape: (usize, usize),
    pub entries: BTreeMap<(usize, usize), c32>,
}

impl DokHost {
    pub fn new(shape: (usize, usize)) -> DokHost {
        DokHost {
            shape,
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, i: usize, j: usize, v: c32) {
        self.entries.insert((i, j), v);
    }

    pub fn to_csr(&self) -> CsrHost {
        from_sorted_entries(self.shape, self.entries.clone())
    }
}

fn from_sorted_entries(shape: (usize, usize), entries: BTreeMap<(usize, usize), c32>) -> CsrHost {
    let m = shape.0;
    let mut indptr = vec![0i32; m + 1];
    let mut indices = Vec::with_capacity(entries.len());
    let mut data = Vec::with_capacity(entries.len());
    for (&(i, j), &v) in &entries {
        indptr[i + 1] += 1;
        indices.push(j as i32);
        data.push(v);
    }
    for i in 0..m {
        indptr[i + 1] += indptr[i];
    }
    CsrHost {
        shape,
        data,
        indices,
        indptr,
    }
}

/// A host sparse matrix in any of the supported construction formats.
#[derive(Clone, Debug)]
pub enum SparseHost {
    Csr(CsrHost),
    Coo(CooHost),
    Dia(DiaHost),
    Dok(DokHost),
}

impl SparseHost {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            SparseHost::Csr(m) => m.shape,
            SparseHost::Coo(m) => m.shape,
            SparseHost::Dia(m) => m.shape,
            SparseHost::Dok(m) => m.shape,
        }
    }

    pub fn dtype(&self) -> Dtype {
        Dtype::Complex64
    }

    pub fn nnz(&self) -> usize {
        match self {
            SparseHost::Csr(m) => m.nnz(),
            SparseHost::Coo(m) => m.data.len(),
            SparseHost::Dia(m) => m.data.iter().filter(|v| **v != c32::new(0.0, 0.0)).count(),
            SparseHost::Dok(m) => m.entries.len(),
        }
    }

    /// Canonicalize to CSR for upload.
    pub fn to_csr(&self) -> CsrHost {
        match self {
            SparseHost::Csr(m) => m.clone(),
            SparseHost::Coo(m) => m.to_csr(),
            SparseHost::Dia(m) => m.to_csr(),
            SparseHost::Dok(m) => m.to_csr(),
        }
    }
}

/// Device-resident CSR matrix bound to the backend that created it.
///
/// Stored once; the adjoint path reuses the same handle through the
/// backend's conjugate-transpose flag.
pub struct DeviceCsr {
    backend: Arc<dyn Backend>,
    name: String,
    shape: (usize, usize),
    nnz: usize,
    index_base: i32,
    data: Vec<c32>,
    indices: Vec<i32>,
    indptr: Vec<i32>,
}

impl DeviceCsr {
    /// Upload a host matrix: canonicalize to CSR, sort indices within each
    /// row, and shift to the backend's index base.
    pub fn from_host(backend: Arc<dyn Backend>, host: &SparseHost, name: &str) -> Result<DeviceCsr> {
        let mut csr = host.to_csr();
        if !csr.has_sorted_indices() {
            csr.sort_indices();
        }
        let base = backend.csr_index_base();
        let mut indices = csr.indices;
        let mut indptr = csr.indptr;
        if base != 0 {
            for j in indices.iter_mut() {
                *j += base;
            }
            for p in indptr.iter_mut() {
                *p += base;
            }
        }
        Ok(DeviceCsr {
            backend,
            name: name.to_string(),
            shape: csr.shape,
            nnz: csr.data.len(),
            index_base: base,
            data: csr.data,
            indices,
            indptr,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn nnz(&self) -> usize {
        self.nnz
    }

    pub fn index_base(&self) -> i32 {
        self.index_base
    }

    pub fn nbytes(&self) -> usize {
        self.data.len() * Dtype::Complex64.itemsize()
            + (self.indices.len() + self.indptr.len()) * std::mem::size_of::<i32>()
    }

    /// `y <- alpha * A * x + beta * y`
    pub fn forward(&self, y: &DeviceArray, x: &DeviceArray, alpha: c32, beta: c32) -> Result<()> {
        self.backend.ccsrmm(
            y,
            self.shape,
            &self.indices,
            &self.indptr,
            &self.data,
            self.index_base,
            x,
            alpha,
            beta,
            false,
        )
    }

    /// `y <- alpha * A^H * x + beta * y`
    pub fn adjoint(&self, y: &DeviceArray, x: &DeviceArray, alpha: c32, beta: c32) -> Result<()> {
        self.backend.ccsrmm(
            y,
            self.shape,
            &self.indices,
            &self.indptr,
            &self.data,
            self.index_base,
            x,
            alpha,
            beta,
            true,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn c(re: f32) -> c32 {
        c32::new(re, 0.0)
    }

    #[test]
    fn csr_validation() {
        assert!(CsrHost::new((2, 2), vec![c(1.0)], vec![0], vec![0, 1, 1]).is_ok());
        // short indptr
        assert!(CsrHost::new((2, 2), vec![c(1.0)], vec![0], vec![0, 1]).is_err());
        // column out of range
        assert!(CsrHost::new((2, 2), vec![c(1.0)], vec![2], vec![0, 1, 1]).is_err());
    }

    #[test]
    fn sort_indices_carries_values() {
        let mut m = CsrHost::new(
            (1, 3),
            vec![c(3.0), c(1.0)],
            vec![2, 0],
            vec![0, 2],
        )
        .unwrap();
        assert!(!m.has_sorted_indices());
        m.sort_indices();
        assert_eq!(m.indices, vec![0, 2]);
        assert_eq!(m.data, vec![c(1.0), c(3.0)]);
    }

    #[test]
    fn coo_to_csr_orders_rows_and_columns() {
        let coo = CooHost::new(
            (2, 3),
            vec![1, 0, 1],
            vec![2, 1, 0],
            vec![c(5.0), c(2.0), c(4.0)],
        )
        .unwrap();
        let csr = coo.to_csr();
        assert_eq!(csr.indptr, vec![0, 1, 3]);
        assert_eq!(csr.indices, vec![1, 0, 2]);
        assert_eq!(csr.data, vec![c(2.0), c(4.0), c(5.0)]);
    }

    #[test]
    fn dia_to_csr_places_diagonals() {
        // main diagonal and superdiagonal of a 2x2
        let dia = DiaHost::new(
            (2, 2),
            vec![0, 1],
            vec![c(1.0), c(2.0), c(0.0), c(3.0)],
        )
        .unwrap();
        let csr = dia.to_csr();
        assert_eq!(csr.indptr, vec![0, 2, 3]);
        assert_eq!(csr.indices, vec![0, 1, 1]);
        assert_eq!(csr.data, vec![c(1.0), c(3.0), c(2.0)]);
    }

    #[test]
    fn dok_to_csr() {
        let mut dok = DokHost::new((2, 2));
        dok.insert(1, 0, c(7.0));
        dok.insert(0, 1, c(8.0));
        let csr = dok.to_csr();
        assert_eq!(csr.indptr, vec![0, 1, 2]);
        assert_eq!(csr.indices, vec![1, 0]);
        assert_eq!(csr.data, vec![c(8.0), c(7.0)]);
    }
}
