//! Differentiable tensor operations.
//!
//! Each operation computes its result eagerly and, when gradient tracking is
//! enabled and at least one input requires gradients, records a backward
//! function on the thread-local tape. Shape mismatches panic with the
//! offending shapes; the model layer validates dimensions before training so
//! these indicate internal bugs.

use std::sync::Arc;

use crate::primitives::Matrix;

use super::grad_fn::{
    AddBackward, ConcatRowsBackward, CrossEntropyBackward, GatherRowsBackward, GradFn,
    MatmulBackward, MulScalarBackward, ReluBackward, SelectBackward, SubBackward,
    SumSquaresBackward,
};
use super::tensor::{Tensor, TensorId};
use super::{is_grad_enabled, with_tape};

fn record_op(
    output: &mut Tensor,
    grad_fn: Arc<dyn GradFn>,
    input_ids: Vec<TensorId>,
    any_requires_grad: bool,
) {
    if is_grad_enabled() && any_requires_grad {
        output.set_requires_grad(true);
        let id = output.id();
        with_tape(|tape| tape.record(id, grad_fn, input_ids));
    }
}

impl Tensor {
    /// Matrix multiplication: `self · other`.
    ///
    /// # Panics
    ///
    /// Panics if `self.cols() != other.rows()`.
    #[must_use]
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        let result = self.data().matmul(other.data()).unwrap_or_else(|_| {
            panic!(
                "matmul shape mismatch: {}x{} · {}x{}",
                self.rows(),
                self.cols(),
                other.rows(),
                other.cols()
            )
        });

        let mut output = Tensor::new(result);
        record_op(
            &mut output,
            Arc::new(MatmulBackward {
                lhs: self.data().clone(),
                rhs: other.data().clone(),
            }),
            vec![self.id(), other.id()],
            self.requires_grad_enabled() || other.requires_grad_enabled(),
        );
        output
    }

    /// Element-wise addition.
    ///
    /// # Panics
    ///
    /// Panics if shapes differ.
    #[must_use]
    pub fn add(&self, other: &Tensor) -> Tensor {
        let result = self.data().add(other.data()).unwrap_or_else(|_| {
            panic!(
                "add shape mismatch: {}x{} + {}x{}",
                self.rows(),
                self.cols(),
                other.rows(),
                other.cols()
            )
        });

        let mut output = Tensor::new(result);
        record_op(
            &mut output,
            Arc::new(AddBackward),
            vec![self.id(), other.id()],
            self.requires_grad_enabled() || other.requires_grad_enabled(),
        );
        output
    }

    /// Element-wise subtraction.
    ///
    /// # Panics
    ///
    /// Panics if shapes differ.
    #[must_use]
    pub fn sub(&self, other: &Tensor) -> Tensor {
        let result = self.data().sub(other.data()).unwrap_or_else(|_| {
            panic!(
                "sub shape mismatch: {}x{} - {}x{}",
                self.rows(),
                self.cols(),
                other.rows(),
                other.cols()
            )
        });

        let mut output = Tensor::new(result);
        record_op(
            &mut output,
            Arc::new(SubBackward),
            vec![self.id(), other.id()],
            self.requires_grad_enabled() || other.requires_grad_enabled(),
        );
        output
    }

    /// Multiply every element by a scalar.
    #[must_use]
    pub fn mul_scalar(&self, scalar: f32) -> Tensor {
        let mut output = Tensor::new(self.data().mul_scalar(scalar));
        record_op(
            &mut output,
            Arc::new(MulScalarBackward { scalar }),
            vec![self.id()],
            self.requires_grad_enabled(),
        );
        output
    }

    /// Rectified linear unit: `max(x, 0)` element-wise.
    #[must_use]
    pub fn relu(&self) -> Tensor {
        let result = self.data().map(|x| x.max(0.0));
        let mut output = Tensor::new(result);
        record_op(
            &mut output,
            Arc::new(ReluBackward {
                input: self.data().clone(),
            }),
            vec![self.id()],
            self.requires_grad_enabled(),
        );
        output
    }

    /// Gather rows by index into a new `indices.len() x cols` tensor.
    ///
    /// Indices may repeat; gradients accumulate on repeated rows.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    #[must_use]
    pub fn gather_rows(&self, indices: &[usize]) -> Tensor {
        let cols = self.cols();
        let mut data = Vec::with_capacity(indices.len() * cols);
        for &i in indices {
            assert!(
                i < self.rows(),
                "gather_rows index {i} out of bounds for {} rows",
                self.rows()
            );
            data.extend_from_slice(self.data().row_slice(i));
        }
        let result =
            Matrix::from_vec(indices.len(), cols, data).expect("gathered rows share the width");

        let mut output = Tensor::new(result);
        record_op(
            &mut output,
            Arc::new(GatherRowsBackward {
                indices: indices.to_vec(),
                input_rows: self.rows(),
            }),
            vec![self.id()],
            self.requires_grad_enabled(),
        );
        output
    }

    /// Stack tensors vertically (row-wise concatenation).
    ///
    /// Zero-row parts are allowed. Gradients split back into the original
    /// partitions.
    ///
    /// # Panics
    ///
    /// Panics if `parts` is empty or column counts differ.
    #[must_use]
    pub fn concat_rows(parts: &[&Tensor]) -> Tensor {
        assert!(!parts.is_empty(), "concat_rows requires at least one part");
        let matrices: Vec<&Matrix<f32>> = parts.iter().map(|t| t.data()).collect();
        let result = Matrix::vstack(&matrices).unwrap_or_else(|_| {
            panic!(
                "concat_rows column mismatch across {} parts",
                parts.len()
            )
        });

        let mut output = Tensor::new(result);
        record_op(
            &mut output,
            Arc::new(ConcatRowsBackward {
                part_rows: parts.iter().map(|t| t.rows()).collect(),
            }),
            parts.iter().map(|t| t.id()).collect(),
            parts.iter().any(|t| t.requires_grad_enabled()),
        );
        output
    }

    /// Select a single element as a 1x1 tensor.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `col` is out of bounds.
    #[must_use]
    pub fn select(&self, row: usize, col: usize) -> Tensor {
        assert!(
            row < self.rows() && col < self.cols(),
            "select ({row}, {col}) out of bounds for {}x{}",
            self.rows(),
            self.cols()
        );
        let mut output = Tensor::scalar(self.data().get(row, col));
        record_op(
            &mut output,
            Arc::new(SelectBackward {
                row,
                col,
                input_rows: self.rows(),
                input_cols: self.cols(),
            }),
            vec![self.id()],
            self.requires_grad_enabled(),
        );
        output
    }

    /// Sum of squared elements as a 1x1 tensor.
    ///
    /// Used for L2 weight regularization.
    #[must_use]
    pub fn sum_of_squares(&self) -> Tensor {
        let total: f32 = self.data().as_slice().iter().map(|x| x * x).sum();
        let mut output = Tensor::scalar(total);
        record_op(
            &mut output,
            Arc::new(SumSquaresBackward {
                input: self.data().clone(),
            }),
            vec![self.id()],
            self.requires_grad_enabled(),
        );
        output
    }

    /// Mean softmax cross-entropy against one-hot targets, as a 1x1 tensor.
    ///
    /// Fuses the softmax and log for numerical stability: each row is shifted
    /// by its maximum before exponentiation.
    ///
    /// # Panics
    ///
    /// Panics if `onehot` does not match the logits' shape.
    #[must_use]
    pub fn cross_entropy_with_logits(&self, onehot: &Matrix<f32>) -> Tensor {
        assert_eq!(
            self.data().shape(),
            onehot.shape(),
            "cross_entropy_with_logits target shape mismatch"
        );

        let (rows, cols) = self.data().shape();
        let mut probs = Matrix::zeros(rows, cols);
        let mut total_loss = 0.0;

        for i in 0..rows {
            let row = self.data().row_slice(i);
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let exps: Vec<f32> = row.iter().map(|&z| (z - max).exp()).collect();
            let sum: f32 = exps.iter().sum();
            let log_sum = sum.ln() + max;

            for j in 0..cols {
                probs.set(i, j, exps[j] / sum);
                // -Σ y_ij * log softmax(z)_ij
                total_loss -= onehot.get(i, j) * (row[j] - log_sum);
            }
        }

        let mean_loss = if rows == 0 { 0.0 } else { total_loss / rows as f32 };
        let mut output = Tensor::scalar(mean_loss);
        record_op(
            &mut output,
            Arc::new(CrossEntropyBackward {
                probs,
                onehot: onehot.clone(),
            }),
            vec![self.id()],
            self.requires_grad_enabled(),
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{clear_tape, get_grad, no_grad};

    fn tensor(rows: usize, cols: usize, data: Vec<f32>) -> Tensor {
        Tensor::new(Matrix::from_vec(rows, cols, data).unwrap())
    }

    #[test]
    fn test_matmul_forward_and_backward() {
        clear_tape();
        let w = tensor(2, 1, vec![0.5, -1.0]).requires_grad();
        let x = tensor(1, 2, vec![2.0, 4.0]);

        let y = x.matmul(&w);
        assert_eq!(y.item(), -3.0);
        y.backward();

        let dw = get_grad(w.id()).expect("w gradient");
        assert_eq!(dw.as_slice(), &[2.0, 4.0]);
        clear_tape();
    }

    #[test]
    fn test_chained_matmul_gradient() {
        clear_tape();
        // y = (x · w1) · w2, all 1x1
        let w1 = tensor(1, 1, vec![2.0]).requires_grad();
        let w2 = tensor(1, 1, vec![3.0]).requires_grad();
        let x = tensor(1, 1, vec![5.0]);

        let y = x.matmul(&w1).matmul(&w2);
        assert_eq!(y.item(), 30.0);
        y.backward();

        assert_eq!(get_grad(w1.id()).unwrap().get(0, 0), 15.0); // x * w2
        assert_eq!(get_grad(w2.id()).unwrap().get(0, 0), 10.0); // x * w1
        clear_tape();
    }

    #[test]
    fn test_relu_zeroes_negative_gradient_paths() {
        clear_tape();
        let w = tensor(1, 2, vec![-1.0, 2.0]).requires_grad();
        let y = w.relu().sum_of_squares();
        y.backward();

        let dw = get_grad(w.id()).expect("w gradient");
        // relu kills the negative lane; d(x²)/dx = 2x = 4 on the positive one
        assert_eq!(dw.as_slice(), &[0.0, 4.0]);
        clear_tape();
    }

    #[test]
    fn test_gather_rows_gradient_scatters() {
        clear_tape();
        let x = tensor(3, 1, vec![1.0, 2.0, 3.0]).requires_grad();
        let y = x.gather_rows(&[2, 0]).sum_of_squares();
        assert_eq!(y.item(), 10.0);
        y.backward();

        let dx = get_grad(x.id()).expect("x gradient");
        assert_eq!(dx.as_slice(), &[2.0, 0.0, 6.0]);
        clear_tape();
    }

    #[test]
    fn test_concat_rows_gradient_splits_to_parts() {
        clear_tape();
        let top = tensor(1, 1, vec![1.0]);
        let mid = tensor(1, 1, vec![2.0]).requires_grad();
        let bot = tensor(1, 1, vec![3.0]);

        let stacked = Tensor::concat_rows(&[&top, &mid, &bot]);
        assert_eq!(stacked.data().as_slice(), &[1.0, 2.0, 3.0]);

        let y = stacked.sum_of_squares();
        y.backward();

        let dm = get_grad(mid.id()).expect("mid gradient");
        assert_eq!(dm.as_slice(), &[4.0]);
        clear_tape();
    }

    #[test]
    fn test_select_and_sub_gradient() {
        clear_tape();
        let x = tensor(2, 2, vec![1.0, 2.0, 3.0, 4.0]).requires_grad();
        // gap = x[0,1] - x[1,0]
        let gap = x.select(0, 1).sub(&x.select(1, 0));
        assert_eq!(gap.item(), -1.0);
        gap.backward();

        let dx = get_grad(x.id()).expect("x gradient");
        assert_eq!(dx.as_slice(), &[0.0, 1.0, -1.0, 0.0]);
        clear_tape();
    }

    #[test]
    fn test_cross_entropy_uniform_logits() {
        clear_tape();
        let logits = tensor(2, 2, vec![0.0, 0.0, 0.0, 0.0]).requires_grad();
        let onehot = Matrix::from_vec(2, 2, vec![1.0, 0.0, 0.0, 1.0]).unwrap();

        let loss = logits.cross_entropy_with_logits(&onehot);
        assert!((loss.item() - 2.0_f32.ln()).abs() < 1e-6);
        loss.backward();

        let dz = get_grad(logits.id()).expect("logits gradient");
        // (p - y) / m with p = 0.5 everywhere and m = 2
        let expected = [-0.25, 0.25, 0.25, -0.25];
        for (a, e) in dz.as_slice().iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-6);
        }
        clear_tape();
    }

    #[test]
    fn test_cross_entropy_shift_invariant() {
        clear_tape();
        let a = tensor(1, 2, vec![1.0, 3.0]);
        let b = tensor(1, 2, vec![101.0, 103.0]);
        let onehot = Matrix::from_vec(1, 2, vec![0.0, 1.0]).unwrap();

        let la = a.cross_entropy_with_logits(&onehot).item();
        let lb = b.cross_entropy_with_logits(&onehot).item();
        assert!((la - lb).abs() < 1e-5);
        clear_tape();
    }

    #[test]
    fn test_l2_penalty_gradient_adds_to_data_gradient() {
        clear_tape();
        // loss = (x·w)² + λ·Σw², both terms touch w
        let w = tensor(1, 1, vec![2.0]).requires_grad();
        let x = tensor(1, 1, vec![3.0]);

        let fit = x.matmul(&w).sum_of_squares();
        let reg = w.sum_of_squares().mul_scalar(0.5);
        let loss = fit.add(&reg);
        loss.backward();

        let dw = get_grad(w.id()).expect("w gradient");
        // d/dw (9w²) + 0.5 · 2w = 36 + 2
        assert_eq!(dw.get(0, 0), 38.0);
        clear_tape();
    }

    #[test]
    fn test_no_requires_grad_records_nothing() {
        clear_tape();
        let a = tensor(1, 2, vec![1.0, 2.0]);
        let b = tensor(2, 1, vec![3.0, 4.0]);
        let y = a.matmul(&b);
        assert_eq!(y.item(), 11.0);
        assert!(!y.requires_grad_enabled());
        assert!(crate::autograd::with_tape(|tape| tape.is_empty()));
        clear_tape();
    }

    #[test]
    fn test_no_grad_inference_path() {
        clear_tape();
        let w = tensor(1, 1, vec![2.0]).requires_grad();
        let y = no_grad(|| w.mul_scalar(3.0));
        assert_eq!(y.item(), 6.0);
        assert!(crate::autograd::with_tape(|tape| tape.is_empty()));
        clear_tape();
    }
}
