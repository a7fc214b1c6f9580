//! Graph convolutional network for semi-supervised node classification.
//!
//! The model propagates features through spectral graph convolutions:
//!
//! ```text
//! H_0 = X
//! H_l = act_l( Â (H_{l-1} W_l) )
//! ```
//!
//! with `Â = D^{-1/2} A D^{-1/2}` the normalized adjacency. Training
//! minimizes softmax cross-entropy over the labeled nodes plus an L2 penalty
//! on the weights. Unlabeled nodes participate in every forward pass through
//! the adjacency structure, which is what makes the training
//! semi-supervised.
//!
//! # Example
//!
//! ```
//! use asediar::gcn::{GcnConfig, GcnModel};
//! use asediar::graph::{adjacency::GraphAdjacency, spectral};
//! use asediar::primitives::Matrix;
//! use asediar::traits::GraphClassifier;
//!
//! let x = Matrix::from_vec(4, 1, vec![-1.0, -0.9, 0.9, 1.0]).unwrap();
//! let y = vec![0, 0, 1, 1];
//!
//! let mut builder = GraphAdjacency::new(2).with_self_loops();
//! let a = builder.build_adjacency(&x).unwrap();
//!
//! let mut model = GcnModel::new(GcnConfig {
//!     max_epochs: 50,
//!     ..GcnConfig::default()
//! });
//! model.fit(&x, &y, &a, &[0, 2]).unwrap();
//! let predictions = model.predict().unwrap();
//! assert_eq!(predictions.len(), 4);
//! ```

mod init;
pub mod optim;

pub use optim::{Adam, GradientDescent, OptimizerKind};

use serde::{Deserialize, Serialize};

use crate::autograd::{clear_tape, get_grad, no_grad, Tensor};
use crate::error::{AsediarError, Result};
use crate::metrics::{self, Average};
use crate::primitives::{Matrix, Vector};
use crate::traits::{FitSummary, GraphClassifier};

use optim::AnyOptimizer;

/// Per-layer activation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Activation {
    /// Identity. The output layer is always linear; softmax lives in the
    /// loss and in [`GcnModel::decision_function`].
    #[default]
    Linear,
    /// Rectified linear unit.
    Relu,
}

/// Hyperparameters for [`GcnModel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcnConfig {
    /// Hidden layer widths. Empty means a single linear convolution from
    /// features to classes.
    pub n_neurons: Vec<usize>,
    /// Activation per hidden layer; must match `n_neurons` in length.
    pub activations: Vec<Activation>,
    /// Base learning rate.
    pub learning_rate: f32,
    /// L2 penalty coefficient on all weight matrices.
    pub l2_lambda: f32,
    /// Epoch cap.
    pub max_epochs: usize,
    /// Early-stopping tolerance on the absolute loss delta between epochs.
    pub tol: f32,
    /// Seed for weight initialization.
    pub seed: u64,
    /// Optimizer selection.
    pub optimizer: OptimizerKind,
}

impl Default for GcnConfig {
    fn default() -> Self {
        Self {
            n_neurons: Vec::new(),
            activations: Vec::new(),
            learning_rate: 0.005,
            l2_lambda: 0.001,
            max_epochs: 5000,
            tol: 1e-4,
            seed: 42,
            optimizer: OptimizerKind::GradientDescent,
        }
    }
}

impl GcnConfig {
    fn validate(&self) -> Result<()> {
        if self.activations.len() != self.n_neurons.len() {
            return Err(AsediarError::InvalidHyperparameter {
                param: "activations".to_string(),
                value: format!("{} entries", self.activations.len()),
                constraint: format!("one per hidden layer ({})", self.n_neurons.len()),
            });
        }
        if self.n_neurons.contains(&0) {
            return Err(AsediarError::InvalidHyperparameter {
                param: "n_neurons".to_string(),
                value: "0".to_string(),
                constraint: "hidden widths must be positive".to_string(),
            });
        }
        if self.learning_rate <= 0.0 {
            return Err(AsediarError::InvalidHyperparameter {
                param: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                constraint: "must be positive".to_string(),
            });
        }
        if self.l2_lambda < 0.0 {
            return Err(AsediarError::InvalidHyperparameter {
                param: "l2_lambda".to_string(),
                value: self.l2_lambda.to_string(),
                constraint: "must be non-negative".to_string(),
            });
        }
        if self.tol <= 0.0 {
            return Err(AsediarError::InvalidHyperparameter {
                param: "tol".to_string(),
                value: self.tol.to_string(),
                constraint: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// State captured by a successful `fit`.
struct FittedState {
    x: Matrix<f32>,
    y: Vec<usize>,
    a_hat: Matrix<f32>,
    n_classes: usize,
    train_indexes: Vec<usize>,
}

/// Graph convolutional network classifier.
pub struct GcnModel {
    config: GcnConfig,
    weights: Vec<Tensor>,
    fitted: Option<FittedState>,
}

impl GcnModel {
    /// Create an unfitted model with the given hyperparameters.
    #[must_use]
    pub fn new(config: GcnConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            fitted: None,
        }
    }

    /// Hyperparameters this model was built with.
    #[must_use]
    pub fn config(&self) -> &GcnConfig {
        &self.config
    }

    /// Labels stored at fit time.
    ///
    /// # Errors
    ///
    /// Returns [`AsediarError::NotFitted`] before `fit`.
    pub fn labels(&self) -> Result<&[usize]> {
        Ok(&self.state()?.y)
    }

    fn state(&self) -> Result<&FittedState> {
        self.fitted
            .as_ref()
            .ok_or_else(|| AsediarError::not_fitted("GcnModel"))
    }

    /// One full pass through the convolution stack.
    fn forward(&self, a_hat: &Tensor, x: &Tensor) -> Tensor {
        let mut h = x.clone();
        for (l, w) in self.weights.iter().enumerate() {
            h = a_hat.matmul(&h.matmul(w));
            if self.config.activations.get(l) == Some(&Activation::Relu) {
                h = h.relu();
            }
        }
        h
    }

    /// Logits for an arbitrary feature matrix over the fitted graph.
    ///
    /// Runs without gradient tracking. Used by ensembles that feed every
    /// member the same shared feature matrix.
    ///
    /// # Errors
    ///
    /// Returns [`AsediarError::NotFitted`] before `fit`, or
    /// [`AsediarError::DimensionMismatch`] if `x` has the wrong shape.
    pub fn logits_with(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let st = self.state()?;
        if x.shape() != st.x.shape() {
            return Err(AsediarError::DimensionMismatch {
                expected: format!("{}x{}", st.x.n_rows(), st.x.n_cols()),
                actual: format!("{}x{}", x.n_rows(), x.n_cols()),
            });
        }

        Ok(no_grad(|| {
            let x_t = Tensor::new(x.clone());
            let a_t = Tensor::new(st.a_hat.clone());
            self.forward(&a_t, &x_t).data().clone()
        }))
    }

    /// Fraction of labeled training nodes whose prediction disagrees with
    /// the stored label.
    ///
    /// # Errors
    ///
    /// Returns [`AsediarError::NotFitted`] before `fit`.
    pub fn prediction_error(&self) -> Result<f32> {
        let predictions = GraphClassifier::predict(self)?;
        let st = self.state()?;
        // micro F1 over a subset is exactly the subset accuracy
        Ok(1.0 - metrics::f1_score_subset(&predictions, &st.y, &st.train_indexes, Average::Micro))
    }

    /// F1 score restricted to the labeled training nodes.
    ///
    /// # Errors
    ///
    /// Returns [`AsediarError::NotFitted`] before `fit`.
    pub fn train_f1_score(&self, average: Average) -> Result<f32> {
        let predictions = GraphClassifier::predict(self)?;
        let st = self.state()?;
        Ok(metrics::f1_score_subset(
            &predictions,
            &st.y,
            &st.train_indexes,
            average,
        ))
    }

    /// F1 score over the held-out nodes, i.e. every node outside the labeled
    /// training subset, scored against caller-supplied ground truth.
    ///
    /// # Errors
    ///
    /// Returns [`AsediarError::NotFitted`] before `fit`, or
    /// [`AsediarError::DimensionMismatch`] if `y_true` does not have one
    /// label per node.
    pub fn heldout_f1_score(&self, y_true: &[usize], average: Average) -> Result<f32> {
        let predictions = GraphClassifier::predict(self)?;
        let st = self.state()?;
        if y_true.len() != predictions.len() {
            return Err(AsediarError::DimensionMismatch {
                expected: format!("{} labels", predictions.len()),
                actual: format!("{} labels", y_true.len()),
            });
        }
        let heldout: Vec<usize> = (0..predictions.len())
            .filter(|i| !st.train_indexes.contains(i))
            .collect();
        Ok(metrics::f1_score_subset(&predictions, y_true, &heldout, average))
    }

    /// Gradient of `logit[target, label_new] - logit[target, label_old]`
    /// with respect to the attacker node's feature row, evaluated on an
    /// explicit feature matrix.
    ///
    /// # Errors
    ///
    /// Returns [`AsediarError::NotFitted`] before `fit`, or an index error
    /// if a node or label is out of bounds.
    pub fn attack_gradient_with(
        &self,
        x: &Matrix<f32>,
        target: usize,
        attacker: usize,
        label_new: usize,
        label_old: usize,
    ) -> Result<Vector<f32>> {
        let st = self.state()?;
        let n = x.n_rows();
        if target >= n {
            return Err(AsediarError::index_out_of_bounds(target, n));
        }
        if attacker >= n {
            return Err(AsediarError::index_out_of_bounds(attacker, n));
        }
        if label_new >= st.n_classes {
            return Err(AsediarError::index_out_of_bounds(label_new, st.n_classes));
        }
        if label_old >= st.n_classes {
            return Err(AsediarError::index_out_of_bounds(label_old, st.n_classes));
        }

        clear_tape();
        let above = Tensor::new(x.rows_range(0..attacker));
        let row = Tensor::new(x.rows_range(attacker..attacker + 1)).requires_grad();
        let below = Tensor::new(x.rows_range(attacker + 1..n));
        let x_t = Tensor::concat_rows(&[&above, &row, &below]);
        let a_t = Tensor::new(st.a_hat.clone());

        let logits = self.forward(&a_t, &x_t);
        let gap = logits
            .select(target, label_new)
            .sub(&logits.select(target, label_old));
        gap.backward();

        let grad = get_grad(row.id()).ok_or_else(|| {
            AsediarError::Other("attacker row received no gradient".to_string())
        })?;
        clear_tape();

        Ok(Vector::from_slice(grad.row_slice(0)))
    }
}

impl GraphClassifier for GcnModel {
    fn fit(
        &mut self,
        x: &Matrix<f32>,
        y: &[usize],
        a: &Matrix<f32>,
        train_indexes: &[usize],
    ) -> Result<FitSummary> {
        self.config.validate()?;

        let n = x.n_rows();
        if y.len() != n {
            return Err(AsediarError::DimensionMismatch {
                expected: format!("{n} labels for {n} nodes"),
                actual: format!("{} labels", y.len()),
            });
        }
        if x.n_cols() == 0 {
            return Err(AsediarError::NoTrainableParameters);
        }
        if train_indexes.is_empty() {
            return Err(AsediarError::InvalidHyperparameter {
                param: "train_indexes".to_string(),
                value: "empty".to_string(),
                constraint: "at least one labeled node".to_string(),
            });
        }
        for &idx in train_indexes {
            if idx >= n {
                return Err(AsediarError::index_out_of_bounds(idx, n));
            }
        }

        let (_, a_hat) = crate::graph::spectral::normalize(a)?;
        if a.n_rows() != n {
            return Err(AsediarError::DimensionMismatch {
                expected: format!("{n}x{n} adjacency"),
                actual: format!("{}x{}", a.n_rows(), a.n_cols()),
            });
        }

        let n_classes = y.iter().max().copied().unwrap_or(0) + 1;

        // layer widths: features, hidden stack, classes
        let mut sizes = vec![x.n_cols()];
        sizes.extend_from_slice(&self.config.n_neurons);
        sizes.push(n_classes);

        self.weights = sizes
            .windows(2)
            .enumerate()
            .map(|(l, pair)| {
                init::truncated_normal(pair[0], pair[1], Some(self.config.seed + l as u64))
                    .requires_grad()
            })
            .collect();

        // one-hot targets for the labeled subset
        let mut onehot = Matrix::zeros(train_indexes.len(), n_classes);
        for (k, &idx) in train_indexes.iter().enumerate() {
            onehot.set(k, y[idx], 1.0);
        }

        let mut optimizer = AnyOptimizer::new(self.config.optimizer, self.config.learning_rate);
        let mut summary = FitSummary {
            epochs_run: 0,
            loss: 0.0,
            converged: false,
        };
        let mut prev_loss = 0.0_f32;

        for epoch in 0..self.config.max_epochs {
            clear_tape();
            let x_t = Tensor::new(x.clone());
            let a_t = Tensor::new(a_hat.clone());

            let logits = self.forward(&a_t, &x_t);
            let train_logits = logits.gather_rows(train_indexes);
            let mut loss = train_logits.cross_entropy_with_logits(&onehot);
            if self.config.l2_lambda > 0.0 {
                for w in &self.weights {
                    loss = loss.add(&w.sum_of_squares().mul_scalar(self.config.l2_lambda));
                }
            }

            let loss_val = loss.item();
            loss.backward();

            let mut params: Vec<&mut Tensor> = self.weights.iter_mut().collect();
            optimizer.step_with_params(&mut params);

            if epoch % 100 == 0 {
                log::debug!("epoch {epoch}: loss {loss_val:.6}");
            }

            summary.epochs_run = epoch + 1;
            summary.loss = loss_val;

            if epoch > 0 && (loss_val - prev_loss).abs() < self.config.tol {
                summary.converged = true;
                break;
            }
            prev_loss = loss_val;
        }
        clear_tape();

        log::debug!(
            "training finished after {} epochs, loss {:.6}, converged: {}",
            summary.epochs_run,
            summary.loss,
            summary.converged
        );

        self.fitted = Some(FittedState {
            x: x.clone(),
            y: y.to_vec(),
            a_hat,
            n_classes,
            train_indexes: train_indexes.to_vec(),
        });

        Ok(summary)
    }

    fn decision_function(&self) -> Result<Matrix<f32>> {
        let st = self.state()?;
        let logits = self.logits_with(&st.x)?;
        Ok(softmax_rows(&logits))
    }

    fn predict(&self) -> Result<Vec<usize>> {
        let st = self.state()?;
        let logits = self.logits_with(&st.x)?;
        Ok(argmax_rows(&logits))
    }

    fn n_classes(&self) -> Result<usize> {
        Ok(self.state()?.n_classes)
    }

    fn attack_gradient(
        &mut self,
        target: usize,
        attacker: usize,
        label_new: usize,
        label_old: usize,
    ) -> Result<Vector<f32>> {
        let x = self.state()?.x.clone();
        self.attack_gradient_with(&x, target, attacker, label_new, label_old)
    }

    fn feature_row(&self, node: usize) -> Result<Vector<f32>> {
        let st = self.state()?;
        if node >= st.x.n_rows() {
            return Err(AsediarError::index_out_of_bounds(node, st.x.n_rows()));
        }
        Ok(Vector::from_slice(st.x.row_slice(node)))
    }

    fn set_feature_row(&mut self, node: usize, row: &Vector<f32>) -> Result<()> {
        let st = self
            .fitted
            .as_mut()
            .ok_or_else(|| AsediarError::not_fitted("GcnModel"))?;
        if node >= st.x.n_rows() {
            return Err(AsediarError::index_out_of_bounds(node, st.x.n_rows()));
        }
        if row.len() != st.x.n_cols() {
            return Err(AsediarError::DimensionMismatch {
                expected: format!("{} features", st.x.n_cols()),
                actual: format!("{} features", row.len()),
            });
        }
        st.x.set_row(node, row.as_slice());
        Ok(())
    }
}

/// Row-wise softmax with max-shift for stability.
pub(crate) fn softmax_rows(logits: &Matrix<f32>) -> Matrix<f32> {
    let (rows, cols) = logits.shape();
    let mut out = Matrix::zeros(rows, cols);
    for i in 0..rows {
        let row = logits.row_slice(i);
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = row.iter().map(|&z| (z - max).exp()).collect();
        let sum: f32 = exps.iter().sum();
        for j in 0..cols {
            out.set(i, j, exps[j] / sum);
        }
    }
    out
}

/// Index of the row-wise maximum, first on ties.
pub(crate) fn argmax_rows(m: &Matrix<f32>) -> Vec<usize> {
    (0..m.n_rows())
        .map(|i| {
            let row = m.row_slice(i);
            let mut best = 0;
            for (j, &v) in row.iter().enumerate() {
                if v > row[best] {
                    best = j;
                }
            }
            best
        })
        .collect()
}
