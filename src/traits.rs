//! Core traits shared across models.

use crate::error::Result;
use crate::primitives::{Matrix, Vector};

/// Outcome of a training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSummary {
    /// Number of epochs actually run.
    pub epochs_run: usize,
    /// Training loss after the final epoch.
    pub loss: f32,
    /// Whether the loss delta dropped below tolerance before the epoch cap.
    pub converged: bool,
}

/// A node classifier over a fixed graph, with the hooks adversarial attack
/// search needs.
///
/// Implementors keep the fitted feature matrix internally so that attack
/// search can perturb single feature rows and re-predict without rebuilding
/// the model. Both [`crate::gcn::GcnModel`] and
/// [`crate::ensemble::EnsembleGcn`] implement this trait, so attacks run
/// unchanged against either.
pub trait GraphClassifier {
    /// Train on features `x`, labels `y`, and adjacency `a`, using only the
    /// labeled rows listed in `train_indexes` for the loss.
    fn fit(
        &mut self,
        x: &Matrix<f32>,
        y: &[usize],
        a: &Matrix<f32>,
        train_indexes: &[usize],
    ) -> Result<FitSummary>;

    /// Class probabilities for every node, `n_nodes x n_classes`.
    fn decision_function(&self) -> Result<Matrix<f32>>;

    /// Predicted class label for every node.
    fn predict(&self) -> Result<Vec<usize>>;

    /// Number of classes seen during fitting.
    fn n_classes(&self) -> Result<usize>;

    /// Gradient of the logit gap `logit[target, label_new] -
    /// logit[target, label_old]` with respect to the attacker node's feature
    /// row.
    fn attack_gradient(
        &mut self,
        target: usize,
        attacker: usize,
        label_new: usize,
        label_old: usize,
    ) -> Result<Vector<f32>>;

    /// Copy of a node's current feature row.
    fn feature_row(&self, node: usize) -> Result<Vector<f32>>;

    /// Overwrite a node's feature row in place.
    fn set_feature_row(&mut self, node: usize, row: &Vector<f32>) -> Result<()>;
}
