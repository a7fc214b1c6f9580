//! Core compute primitives (Vector, Matrix).
//!
//! These types are the numeric foundation for the graph convolution
//! kernels and the autodiff tape.

mod matrix;
mod vector;

pub use matrix::Matrix;
pub use vector::Vector;
