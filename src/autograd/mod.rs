//! Reverse-mode automatic differentiation for graph convolution networks.
//!
//! This module implements tape-based automatic differentiation restricted to
//! 2-D (matrix-shaped) tensors, which is all the spectral graph convolution
//! `H_l = Â (H_{l-1} W_l)` requires.
//!
//! # Architecture
//!
//! The engine uses a define-by-run computational tape:
//! - Operations are recorded to a thread-local tape during the forward pass
//! - Gradients are computed in reverse order during the backward pass
//! - Gradients accumulate for tensors used multiple times
//!
//! # Example
//!
//! ```
//! use asediar::autograd::{clear_tape, get_grad, Tensor};
//! use asediar::primitives::Matrix;
//!
//! clear_tape();
//! let w = Tensor::new(Matrix::from_vec(2, 1, vec![0.5, -0.5]).unwrap()).requires_grad();
//! let x = Tensor::new(Matrix::from_vec(1, 2, vec![1.0, 2.0]).unwrap());
//!
//! // y = x · w, a 1x1 tensor
//! let y = x.matmul(&w);
//! y.backward();
//!
//! let dw = get_grad(w.id()).expect("w participates in the graph");
//! assert_eq!(dw.as_slice(), &[1.0, 2.0]);
//! clear_tape();
//! ```

mod grad_fn;
mod ops;
mod tape;
mod tensor;

pub use grad_fn::GradFn;
pub use tape::Tape;
pub use tensor::{Tensor, TensorId};

use crate::primitives::Matrix;
use std::cell::RefCell;

thread_local! {
    /// Computation tape for the current thread.
    static TAPE: RefCell<Tape> = RefCell::new(Tape::new());

    /// Flag to disable gradient tracking (for inference).
    static GRAD_ENABLED: RefCell<bool> = const { RefCell::new(true) };
}

/// Execute a closure without gradient tracking.
///
/// Used by prediction paths so that inference-only forward passes leave no
/// entries on the tape.
pub fn no_grad<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    GRAD_ENABLED.with(|enabled| {
        let prev = *enabled.borrow();
        *enabled.borrow_mut() = false;
        let result = f();
        *enabled.borrow_mut() = prev;
        result
    })
}

/// Check if gradient tracking is currently enabled.
#[must_use]
pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(|enabled| *enabled.borrow())
}

/// Get a reference to the thread-local tape.
pub(crate) fn with_tape<F, R>(f: F) -> R
where
    F: FnOnce(&mut Tape) -> R,
{
    TAPE.with(|tape| f(&mut tape.borrow_mut()))
}

/// Clear the tape and all stored gradients.
///
/// Call between training steps so stale entries don't accumulate.
pub fn clear_tape() {
    TAPE.with(|tape| tape.borrow_mut().clear());
}

/// Get the gradient accumulated for a tensor during the last backward pass.
#[must_use]
pub fn get_grad(id: TensorId) -> Option<Matrix<f32>> {
    with_tape(|tape| tape.grad(id))
}
