//! Matrix-shaped tensor with gradient tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::primitives::Matrix;

use super::with_tape;

/// Unique identifier for tensors on the computation tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorId(u64);

impl TensorId {
    /// Generate a new unique tensor ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        TensorId(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for TensorId {
    fn default() -> Self {
        Self::new()
    }
}

/// A 2-D tensor with optional gradient tracking.
///
/// Scalars are represented as 1x1 tensors. The tensor owns its data as a
/// [`Matrix<f32>`]; gradient state lives on the thread-local tape, keyed by
/// [`TensorId`], so the same weight tensor keeps receiving gradients across
/// epochs as long as its data is updated in place.
#[derive(Clone)]
pub struct Tensor {
    data: Matrix<f32>,
    requires_grad: bool,
    id: TensorId,
}

impl Tensor {
    /// Create a tensor from a matrix. Gradient tracking is off by default.
    #[must_use]
    pub fn new(data: Matrix<f32>) -> Self {
        Self {
            data,
            requires_grad: false,
            id: TensorId::new(),
        }
    }

    /// Create a tensor of zeros.
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::new(Matrix::zeros(rows, cols))
    }

    /// Create a 1x1 scalar tensor.
    #[must_use]
    pub fn scalar(value: f32) -> Self {
        Self::new(Matrix::from_vec(1, 1, vec![value]).expect("1x1 shape"))
    }

    /// Enable gradient tracking for this tensor.
    ///
    /// Returns self for method chaining.
    #[must_use]
    pub fn requires_grad(mut self) -> Self {
        self.requires_grad = true;
        self
    }

    /// Check if this tensor requires gradient computation.
    #[must_use]
    pub fn requires_grad_enabled(&self) -> bool {
        self.requires_grad
    }

    pub(crate) fn set_requires_grad(&mut self, requires_grad: bool) {
        self.requires_grad = requires_grad;
    }

    /// Get the tensor's unique identifier.
    #[must_use]
    pub fn id(&self) -> TensorId {
        self.id
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.data.n_rows()
    }

    /// Number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.data.n_cols()
    }

    /// Get a reference to the underlying matrix.
    #[must_use]
    pub fn data(&self) -> &Matrix<f32> {
        &self.data
    }

    /// Get a mutable reference to the underlying matrix.
    ///
    /// Used by optimizers to update parameters in place, preserving the
    /// tensor's identity on the tape.
    pub fn data_mut(&mut self) -> &mut Matrix<f32> {
        &mut self.data
    }

    /// Detach tensor from the tape.
    ///
    /// Returns a new tensor with the same data but no gradient tracking.
    #[must_use]
    pub fn detach(&self) -> Tensor {
        Tensor::new(self.data.clone())
    }

    /// Get the scalar value of a 1x1 tensor.
    ///
    /// # Panics
    ///
    /// Panics if the tensor has more than one element.
    #[must_use]
    pub fn item(&self) -> f32 {
        assert_eq!(
            (self.rows(), self.cols()),
            (1, 1),
            "item() only works on 1x1 tensors, got {}x{}",
            self.rows(),
            self.cols()
        );
        self.data.get(0, 0)
    }

    /// Compute gradients via backpropagation.
    ///
    /// # Panics
    ///
    /// Panics if called on a non-scalar tensor.
    pub fn backward(&self) {
        assert_eq!(
            (self.rows(), self.cols()),
            (1, 1),
            "backward() requires a 1x1 output, got {}x{}",
            self.rows(),
            self.cols()
        );
        self.backward_with_grad(Matrix::from_vec(1, 1, vec![1.0]).expect("1x1 shape"));
    }

    /// Compute gradients seeded with a specified output gradient.
    pub fn backward_with_grad(&self, grad_output: Matrix<f32>) {
        with_tape(|tape| {
            tape.backward(self.id, grad_output);
        });
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.data.shape())
            .field("requires_grad", &self.requires_grad)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
