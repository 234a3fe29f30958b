//! Shared contracts for the matfree operator algebra.
//!
//! This crate defines the pieces every other crate in the workspace agrees
//! on: the `complex64` scalar and dtype vocabulary, the column-major device
//! array, host sparse formats and the device CSR handle, the [`Backend`]
//! numerical contract, and the [`Operator`] capability with its evaluation
//! driver.

pub mod arrays;
pub mod backend;
pub mod operator;
pub mod sparse;
pub mod types;

pub use arrays::{DeviceArray, HostArray};
pub use backend::Backend;
pub use operator::{walk, NodeBase, OpRef, Operator};
pub use sparse::{CooHost, CsrHost, DeviceCsr, DiaHost, DokHost, SparseHost};
pub use types::{c32, Dtype, Error, Result};
