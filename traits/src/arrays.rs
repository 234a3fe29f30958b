//! Column-major complex64 arrays: host-side staging buffers and device
//! arrays with leading-dimension semantics and non-owning sub-views.

use std::cell::UnsafeCell;
use std::ops::Range;
use std::sync::Arc;

use crate::types::{c32, Dtype, Error, Result};

/// Host-side column-major matrix used to stage data for upload and to read
/// results back.
#[derive(Clone, Debug)]
pub struct HostArray {
    shape: (usize, usize),
    data: Vec<c32>,
}

impl HostArray {
    /// Zero-filled host array.
    pub fn zeros(shape: (usize, usize)) -> HostArray {
        HostArray {
            shape,
            data: vec![c32::new(0.0, 0.0); shape.0 * shape.1],
        }
    }

    /// Wrap column-major data of the given shape.
    pub fn from_vec(shape: (usize, usize), data: Vec<c32>) -> Result<HostArray> {
        if data.len() != shape.0 * shape.1 {
            return Err(Error::InvalidArgument(format!(
                "host array of shape {:?} needs {} elements, got {}",
                shape,
                shape.0 * shape.1,
                data.len()
            )));
        }
        Ok(HostArray { shape, data })
    }

    /// A single column vector, the reshape applied to 1-D inputs.
    pub fn column(data: Vec<c32>) -> HostArray {
        let n = data.len();
        HostArray {
            shape: (n, 1),
            data,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn dtype(&self) -> Dtype {
        Dtype::Complex64
    }

    pub fn size(&self) -> usize {
        self.shape.0 * self.shape.1
    }

    pub fn nbytes(&self) -> usize {
        self.size() * self.dtype().itemsize()
    }

    pub fn data(&self) -> &[c32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [c32] {
        &mut self.data
    }

    /// Column `j` of the matrix.
    pub fn col(&self, j: usize) -> &[c32] {
        let m = self.shape.0;
        &self.data[j * m..(j + 1) * m]
    }

    /// Reinterpret the same column-major data under a new shape.
    pub fn with_shape(&self, shape: (usize, usize)) -> Result<HostArray> {
        HostArray::from_vec(shape, self.data.clone())
    }

    pub fn get(&self, i: usize, j: usize) -> c32 {
        self.data[j * self.shape.0 + i]
    }

    pub fn set(&mut self, i: usize, j: usize, v: c32) {
        self.data[j * self.shape.0 + i] = v;
    }
}

/// Backing storage for a device array, shared between an owner and any
/// number of sub-views.
///
/// Interior mutability is required because evaluation mutates `y` through a
/// shared handle while reading `x`, exactly as a device runtime would.
/// The operator layer is single-threaded and a given tree is not reentrant;
/// backend kernels are the only writers and partition their writes by
/// column or by row.
struct Storage {
    cells: UnsafeCell<Vec<c32>>,
}

// Safety: all mutation goes through the unsafe column accessors below, whose
// callers must guarantee disjointness. See the module invariants above.
unsafe impl Send for Storage {}
unsafe impl Sync for Storage {}

impl Storage {
    fn len(&self) -> usize {
        unsafe { (*self.cells.get()).len() }
    }
}

/// Column-major complex64 buffer with an explicit leading dimension.
///
/// The first leading dimension may exceed the row count when the array is a
/// sub-view of a larger buffer. Slicing produces non-owning views that share
/// the parent's storage; the storage lives until the last handle drops.
#[derive(Clone)]
pub struct DeviceArray {
    storage: Arc<Storage>,
    offset: usize,
    shape: (usize, usize),
    ld: usize,
    owner: bool,
}

impl DeviceArray {
    /// Allocate a zero-filled device array.
    pub fn zeros(shape: (usize, usize), _dtype: Dtype) -> DeviceArray {
        DeviceArray {
            storage: Arc::new(Storage {
                cells: UnsafeCell::new(vec![c32::new(0.0, 0.0); shape.0 * shape.1]),
            }),
            offset: 0,
            shape,
            ld: shape.0,
            owner: true,
        }
    }

    /// Allocate and fill from a host array.
    pub fn from_host(host: &HostArray) -> DeviceArray {
        let arr = DeviceArray::zeros(host.shape(), host.dtype());
        // freshly allocated, no aliasing possible
        unsafe {
            for j in 0..host.shape().1 {
                arr.col_slice_mut(j).copy_from_slice(host.col(j));
            }
        }
        arr
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn dtype(&self) -> Dtype {
        Dtype::Complex64
    }

    pub fn size(&self) -> usize {
        self.shape.0 * self.shape.1
    }

    pub fn nbytes(&self) -> usize {
        self.size() * self.dtype().itemsize()
    }

    /// Stride between consecutive columns of the backing buffer.
    pub fn leading_dim(&self) -> usize {
        self.ld
    }

    /// Whether this handle owns its storage or is a sub-view.
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Whether columns are densely packed (leading dimension equals rows).
    pub fn is_contiguous(&self) -> bool {
        self.ld == self.shape.0
    }

    /// Non-owning view of columns `range`, sharing this array's storage.
    pub fn slice_cols(&self, range: Range<usize>) -> DeviceArray {
        debug_assert!(range.start <= range.end && range.end <= self.shape.1);
        DeviceArray {
            storage: Arc::clone(&self.storage),
            offset: self.offset + range.start * self.ld,
            shape: (self.shape.0, range.end - range.start),
            ld: self.ld,
            owner: false,
        }
    }

    /// Non-owning view of rows `range`. The view keeps the parent's leading
    /// dimension, so it is non-contiguous unless it spans every row.
    pub fn slice_rows(&self, range: Range<usize>) -> DeviceArray {
        debug_assert!(range.start <= range.end && range.end <= self.shape.0);
        DeviceArray {
            storage: Arc::clone(&self.storage),
            offset: self.offset + range.start,
            shape: (range.end - range.start, self.shape.1),
            ld: self.ld,
            owner: false,
        }
    }

    /// Reinterpret the buffer under a new 2-D shape of the same size.
    ///
    /// Only valid for contiguous arrays; a strided view cannot be reshaped
    /// without a copy, which this layer never performs silently.
    pub fn reshaped(&self, shape: (usize, usize)) -> Result<DeviceArray> {
        if !self.is_contiguous() {
            return Err(Error::NonContiguous {
                shape: self.shape,
                ld: self.ld,
            });
        }
        if shape.0 * shape.1 != self.size() {
            return Err(Error::InvalidArgument(format!(
                "cannot reshape array of size {} to {:?}",
                self.size(),
                shape
            )));
        }
        Ok(DeviceArray {
            storage: Arc::clone(&self.storage),
            offset: self.offset,
            shape,
            ld: shape.0,
            owner: false,
        })
    }

    /// Pointer to the first element of this array or view.
    pub fn as_ptr(&self) -> *const c32 {
        unsafe { (*self.storage.cells.get()).as_ptr().add(self.offset) }
    }

    /// Mutable pointer to the first element of this array or view.
    pub fn as_mut_ptr(&self) -> *mut c32 {
        unsafe { (*self.storage.cells.get()).as_mut_ptr().add(self.offset) }
    }

    /// Column `j` as a slice.
    ///
    /// # Safety
    ///
    /// The caller must guarantee no live mutable reference overlaps this
    /// column for the lifetime of the returned slice.
    pub unsafe fn col_slice(&self, j: usize) -> &[c32] {
        debug_assert!(j < self.shape.1);
        debug_assert!(self.offset + j * self.ld + self.shape.0 <= self.storage.len());
        std::slice::from_raw_parts(self.as_ptr().add(j * self.ld), self.shape.0)
    }

    /// Column `j` as a mutable slice.
    ///
    /// # Safety
    ///
    /// The caller must guarantee no other live reference overlaps this
    /// column for the lifetime of the returned slice.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn col_slice_mut(&self, j: usize) -> &mut [c32] {
        debug_assert!(j < self.shape.1);
        debug_assert!(self.offset + j * self.ld + self.shape.0 <= self.storage.len());
        std::slice::from_raw_parts_mut(self.as_mut_ptr().add(j * self.ld), self.shape.0)
    }

    /// Fill every element with zero.
    pub fn zero(&self) {
        unsafe {
            for j in 0..self.shape.1 {
                self.col_slice_mut(j).fill(c32::new(0.0, 0.0));
            }
        }
    }

    /// Copy the contents of `src`, which must have the same shape.
    pub fn copy_from(&self, src: &DeviceArray) -> Result<()> {
        if self.shape != src.shape {
            return Err(Error::InvalidArgument(format!(
                "copy between mismatched shapes {:?} and {:?}",
                self.shape, src.shape
            )));
        }
        unsafe {
            for j in 0..self.shape.1 {
                self.col_slice_mut(j).copy_from_slice(src.col_slice(j));
            }
        }
        Ok(())
    }

    /// Overwrite from densely packed column-major host data.
    pub fn fill_from_host(&self, data: &[c32]) -> Result<()> {
        if data.len() != self.size() {
            return Err(Error::InvalidArgument(format!(
                "host data of {} elements does not fill array of size {}",
                data.len(),
                self.size()
            )));
        }
        let m = self.shape.0;
        unsafe {
            for j in 0..self.shape.1 {
                self.col_slice_mut(j).copy_from_slice(&data[j * m..(j + 1) * m]);
            }
        }
        Ok(())
    }

    /// Download into a densely packed column-major host vector.
    pub fn to_host(&self) -> Vec<c32> {
        let mut out = Vec::with_capacity(self.size());
        unsafe {
            for j in 0..self.shape.1 {
                out.extend_from_slice(self.col_slice(j));
            }
        }
        out
    }

    /// Download into a host array of the same shape.
    pub fn to_host_array(&self) -> HostArray {
        HostArray {
            shape: self.shape,
            data: self.to_host(),
        }
    }
}

impl std::fmt::Debug for DeviceArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceArray")
            .field("shape", &self.shape)
            .field("ld", &self.ld)
            .field("offset", &self.offset)
            .field("owner", &self.owner)
            .finish()
    }
}
