//! Gradient function trait and implementations.
//!
//! Each differentiable operation implements `GradFn` to define how gradients
//! flow backward through it. All gradients are matrix-shaped; scalar outputs
//! (losses, logit gaps) are 1x1 matrices.

use crate::primitives::Matrix;

/// Trait for functions that compute gradients during the backward pass.
///
/// Each operation captures the forward-pass context it needs (input values or
/// shapes) and returns one gradient per input tensor, in input order.
pub trait GradFn: Send + Sync {
    /// Compute gradients with respect to inputs.
    ///
    /// # Arguments
    ///
    /// * `grad_output` - Gradient flowing back from downstream operations
    fn backward(&self, grad_output: &Matrix<f32>) -> Vec<Matrix<f32>>;

    /// Human-readable name for debugging.
    fn name(&self) -> &'static str;
}

/// Gradient for matrix multiplication: z = x · y
///
/// dz/dx = g · yᵀ, dz/dy = xᵀ · g
pub(crate) struct MatmulBackward {
    pub(crate) lhs: Matrix<f32>,
    pub(crate) rhs: Matrix<f32>,
}

impl GradFn for MatmulBackward {
    fn backward(&self, grad_output: &Matrix<f32>) -> Vec<Matrix<f32>> {
        let grad_lhs = grad_output
            .matmul(&self.rhs.transpose())
            .expect("forward pass fixed matmul shapes");
        let grad_rhs = self
            .lhs
            .transpose()
            .matmul(grad_output)
            .expect("forward pass fixed matmul shapes");
        vec![grad_lhs, grad_rhs]
    }

    fn name(&self) -> &'static str {
        "MatmulBackward"
    }
}

/// Gradient for element-wise addition: z = x + y
pub(crate) struct AddBackward;

impl GradFn for AddBackward {
    fn backward(&self, grad_output: &Matrix<f32>) -> Vec<Matrix<f32>> {
        vec![grad_output.clone(), grad_output.clone()]
    }

    fn name(&self) -> &'static str {
        "AddBackward"
    }
}

/// Gradient for element-wise subtraction: z = x - y
pub(crate) struct SubBackward;

impl GradFn for SubBackward {
    fn backward(&self, grad_output: &Matrix<f32>) -> Vec<Matrix<f32>> {
        vec![grad_output.clone(), grad_output.mul_scalar(-1.0)]
    }

    fn name(&self) -> &'static str {
        "SubBackward"
    }
}

/// Gradient for scalar multiplication: z = s * x
pub(crate) struct MulScalarBackward {
    pub(crate) scalar: f32,
}

impl GradFn for MulScalarBackward {
    fn backward(&self, grad_output: &Matrix<f32>) -> Vec<Matrix<f32>> {
        vec![grad_output.mul_scalar(self.scalar)]
    }

    fn name(&self) -> &'static str {
        "MulScalarBackward"
    }
}

/// Gradient for ReLU: z = max(x, 0)
pub(crate) struct ReluBackward {
    pub(crate) input: Matrix<f32>,
}

impl GradFn for ReluBackward {
    fn backward(&self, grad_output: &Matrix<f32>) -> Vec<Matrix<f32>> {
        let data: Vec<f32> = grad_output
            .as_slice()
            .iter()
            .zip(self.input.as_slice().iter())
            .map(|(&g, &x)| if x > 0.0 { g } else { 0.0 })
            .collect();
        let (rows, cols) = self.input.shape();
        vec![Matrix::from_vec(rows, cols, data).expect("gradient shares the input's shape")]
    }

    fn name(&self) -> &'static str {
        "ReluBackward"
    }
}

/// Gradient for row gathering: z[k, :] = x[indices[k], :]
///
/// Scatters gradient rows back to their source positions, accumulating when
/// the same row is gathered more than once.
pub(crate) struct GatherRowsBackward {
    pub(crate) indices: Vec<usize>,
    pub(crate) input_rows: usize,
}

impl GradFn for GatherRowsBackward {
    fn backward(&self, grad_output: &Matrix<f32>) -> Vec<Matrix<f32>> {
        let cols = grad_output.n_cols();
        let mut grad = Matrix::zeros(self.input_rows, cols);
        for (k, &src) in self.indices.iter().enumerate() {
            for j in 0..cols {
                let v = grad.get(src, j) + grad_output.get(k, j);
                grad.set(src, j, v);
            }
        }
        vec![grad]
    }

    fn name(&self) -> &'static str {
        "GatherRowsBackward"
    }
}

/// Gradient for row-wise concatenation: z = vstack(parts)
///
/// Splits the gradient back into the original row partitions.
pub(crate) struct ConcatRowsBackward {
    pub(crate) part_rows: Vec<usize>,
}

impl GradFn for ConcatRowsBackward {
    fn backward(&self, grad_output: &Matrix<f32>) -> Vec<Matrix<f32>> {
        let mut grads = Vec::with_capacity(self.part_rows.len());
        let mut offset = 0;
        for &rows in &self.part_rows {
            grads.push(grad_output.rows_range(offset..offset + rows));
            offset += rows;
        }
        grads
    }

    fn name(&self) -> &'static str {
        "ConcatRowsBackward"
    }
}

/// Gradient for single-element selection: z = x[row, col]
pub(crate) struct SelectBackward {
    pub(crate) row: usize,
    pub(crate) col: usize,
    pub(crate) input_rows: usize,
    pub(crate) input_cols: usize,
}

impl GradFn for SelectBackward {
    fn backward(&self, grad_output: &Matrix<f32>) -> Vec<Matrix<f32>> {
        let mut grad = Matrix::zeros(self.input_rows, self.input_cols);
        grad.set(self.row, self.col, grad_output.get(0, 0));
        vec![grad]
    }

    fn name(&self) -> &'static str {
        "SelectBackward"
    }
}

/// Gradient for the squared Frobenius norm: z = Σ x²
pub(crate) struct SumSquaresBackward {
    pub(crate) input: Matrix<f32>,
}

impl GradFn for SumSquaresBackward {
    fn backward(&self, grad_output: &Matrix<f32>) -> Vec<Matrix<f32>> {
        let g = grad_output.get(0, 0);
        vec![self.input.mul_scalar(2.0 * g)]
    }

    fn name(&self) -> &'static str {
        "SumSquaresBackward"
    }
}

/// Gradient for fused softmax cross-entropy over one-hot targets.
///
/// With z the logits, p = softmax(z) row-wise, and y one-hot:
/// d(mean loss)/dz = (p - y) / m
pub(crate) struct CrossEntropyBackward {
    pub(crate) probs: Matrix<f32>,
    pub(crate) onehot: Matrix<f32>,
}

impl GradFn for CrossEntropyBackward {
    fn backward(&self, grad_output: &Matrix<f32>) -> Vec<Matrix<f32>> {
        let g = grad_output.get(0, 0);
        let m = self.probs.n_rows() as f32;
        let grad = self
            .probs
            .sub(&self.onehot)
            .expect("probs and one-hot targets share a shape")
            .mul_scalar(g / m);
        vec![grad]
    }

    fn name(&self) -> &'static str {
        "CrossEntropyBackward"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_grad(v: f32) -> Matrix<f32> {
        Matrix::from_vec(1, 1, vec![v]).expect("1x1 shape")
    }

    #[test]
    fn test_matmul_backward_shapes_and_values() {
        // z = x·y with x 1x2, y 2x1
        let f = MatmulBackward {
            lhs: Matrix::from_vec(1, 2, vec![1.0, 2.0]).unwrap(),
            rhs: Matrix::from_vec(2, 1, vec![3.0, 4.0]).unwrap(),
        };
        let grads = f.backward(&scalar_grad(1.0));
        assert_eq!(grads[0].as_slice(), &[3.0, 4.0]); // g · yᵀ
        assert_eq!(grads[1].as_slice(), &[1.0, 2.0]); // xᵀ · g
    }

    #[test]
    fn test_relu_backward_masks_negative_inputs() {
        let f = ReluBackward {
            input: Matrix::from_vec(1, 3, vec![-1.0, 0.0, 2.0]).unwrap(),
        };
        let g = Matrix::from_vec(1, 3, vec![1.0, 1.0, 1.0]).unwrap();
        let grads = f.backward(&g);
        assert_eq!(grads[0].as_slice(), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_gather_rows_backward_accumulates_duplicates() {
        let f = GatherRowsBackward {
            indices: vec![1, 1],
            input_rows: 3,
        };
        let g = Matrix::from_vec(2, 1, vec![0.5, 0.25]).unwrap();
        let grads = f.backward(&g);
        assert_eq!(grads[0].as_slice(), &[0.0, 0.75, 0.0]);
    }

    #[test]
    fn test_concat_rows_backward_splits() {
        let f = ConcatRowsBackward {
            part_rows: vec![1, 0, 2],
        };
        let g = Matrix::from_vec(3, 1, vec![1.0, 2.0, 3.0]).unwrap();
        let grads = f.backward(&g);
        assert_eq!(grads.len(), 3);
        assert_eq!(grads[0].as_slice(), &[1.0]);
        assert_eq!(grads[1].n_rows(), 0);
        assert_eq!(grads[2].as_slice(), &[2.0, 3.0]);
    }

    #[test]
    fn test_select_backward_scatters_single_element() {
        let f = SelectBackward {
            row: 1,
            col: 0,
            input_rows: 2,
            input_cols: 2,
        };
        let grads = f.backward(&scalar_grad(4.0));
        assert_eq!(grads[0].as_slice(), &[0.0, 0.0, 4.0, 0.0]);
    }

    #[test]
    fn test_sum_squares_backward() {
        let f = SumSquaresBackward {
            input: Matrix::from_vec(1, 2, vec![1.5, -2.0]).unwrap(),
        };
        let grads = f.backward(&scalar_grad(1.0));
        assert_eq!(grads[0].as_slice(), &[3.0, -4.0]);
    }

    #[test]
    fn test_cross_entropy_backward_is_probs_minus_targets() {
        let f = CrossEntropyBackward {
            probs: Matrix::from_vec(2, 2, vec![0.7, 0.3, 0.4, 0.6]).unwrap(),
            onehot: Matrix::from_vec(2, 2, vec![1.0, 0.0, 0.0, 1.0]).unwrap(),
        };
        let grads = f.backward(&scalar_grad(1.0));
        let expected = [-0.15, 0.15, 0.2, -0.2]; // (p - y) / 2
        for (a, e) in grads[0].as_slice().iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-6);
        }
    }
}
