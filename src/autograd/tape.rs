//! Computation tape recording operations for the backward pass.

use std::collections::HashMap;
use std::sync::Arc;

use crate::primitives::Matrix;

use super::grad_fn::GradFn;
use super::tensor::TensorId;

/// Entry on the computation tape.
#[derive(Clone)]
pub(crate) struct TapeEntry {
    /// ID of the output tensor
    pub output_id: TensorId,

    /// Function to compute input gradients
    pub grad_fn: Arc<dyn GradFn>,

    /// IDs of input tensors, in forward-pass order
    pub input_ids: Vec<TensorId>,
}

/// Tape of recorded operations plus gradients from the last backward pass.
///
/// Operations are appended in forward order and replayed in reverse during
/// [`Tape::backward`]. Each thread owns one tape (thread-local storage in the
/// parent module), so no synchronization is needed during training.
#[allow(missing_debug_implementations)]
pub struct Tape {
    entries: Vec<TapeEntry>,
    grads: HashMap<TensorId, Matrix<f32>>,
}

impl Tape {
    /// Create an empty tape.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            grads: HashMap::new(),
        }
    }

    /// Clear recorded operations and stored gradients.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.grads.clear();
    }

    /// Record an operation.
    pub(crate) fn record(
        &mut self,
        output_id: TensorId,
        grad_fn: Arc<dyn GradFn>,
        input_ids: Vec<TensorId>,
    ) {
        self.entries.push(TapeEntry {
            output_id,
            grad_fn,
            input_ids,
        });
    }

    /// Number of recorded operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the tape is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Gradient for a tensor after the last backward pass.
    #[must_use]
    pub fn grad(&self, id: TensorId) -> Option<Matrix<f32>> {
        self.grads.get(&id).cloned()
    }

    /// Run reverse-mode backpropagation from `output_id`.
    ///
    /// Walks the tape in reverse, propagating `grad_output` through each
    /// recorded operation and accumulating gradients for tensors that appear
    /// as inputs more than once. Results replace any gradients from a
    /// previous backward pass.
    pub fn backward(&mut self, output_id: TensorId, grad_output: Matrix<f32>) {
        let mut grads: HashMap<TensorId, Matrix<f32>> = HashMap::new();
        grads.insert(output_id, grad_output);

        for entry in self.entries.iter().rev() {
            let Some(grad_out) = grads.get(&entry.output_id).cloned() else {
                continue;
            };

            let input_grads = entry.grad_fn.backward(&grad_out);
            debug_assert_eq!(
                input_grads.len(),
                entry.input_ids.len(),
                "{} returned a gradient count mismatch",
                entry.grad_fn.name()
            );

            for (input_id, input_grad) in entry.input_ids.iter().zip(input_grads) {
                match grads.get_mut(input_id) {
                    Some(existing) => {
                        *existing = existing
                            .add(&input_grad)
                            .expect("accumulated gradients share the input's shape");
                    }
                    None => {
                        grads.insert(*input_id, input_grad);
                    }
                }
            }
        }

        self.grads = grads;
    }
}

impl Default for Tape {
    fn default() -> Self {
        Self::new()
    }
}
