//! Ensembles of graph convolutional networks over sampled edge subsets.
//!
//! Each member trains on the same features and labels but on an
//! independently edge-sampled copy of the adjacency matrix, so members see
//! different propagation structure. Predictions average the members' logits
//! before the softmax; attack gradients average the members' per-node
//! gradients. Averaging raw logits rather than probabilities keeps the
//! aggregate differentiable in the same units the members were trained in.

use serde::{Deserialize, Serialize};

use crate::error::{AsediarError, Result};
use crate::gcn::{softmax_rows, GcnConfig, GcnModel};
use crate::graph::GraphAdjacency;
use crate::primitives::{Matrix, Vector};
use crate::traits::{FitSummary, GraphClassifier};

/// Hyperparameters for [`EnsembleGcn`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Number of member models.
    pub n_estimators: usize,
    /// Fraction of undirected edges each member keeps.
    pub edge_sample_prob: f32,
    /// Hyperparameters shared by every member. Member `m` trains with seed
    /// `base.seed + m` so initializations differ deterministically.
    pub base: GcnConfig,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            n_estimators: 1,
            edge_sample_prob: 0.75,
            base: GcnConfig::default(),
        }
    }
}

struct EnsembleFitted {
    x: Matrix<f32>,
    y: Vec<usize>,
    n_classes: usize,
    train_indexes: Vec<usize>,
}

/// Ensemble of [`GcnModel`] members over sampled adjacency matrices.
///
/// The ensemble owns the fitted feature matrix and feeds it to every member
/// explicitly, so a feature perturbation made through
/// [`GraphClassifier::set_feature_row`] is seen by all members at once.
pub struct EnsembleGcn {
    config: EnsembleConfig,
    members: Vec<GcnModel>,
    fitted: Option<EnsembleFitted>,
}

impl EnsembleGcn {
    /// Create an unfitted ensemble.
    #[must_use]
    pub fn new(config: EnsembleConfig) -> Self {
        Self {
            config,
            members: Vec::new(),
            fitted: None,
        }
    }

    /// Number of fitted members.
    #[must_use]
    pub fn n_members(&self) -> usize {
        self.members.len()
    }

    fn state(&self) -> Result<&EnsembleFitted> {
        self.fitted
            .as_ref()
            .ok_or_else(|| AsediarError::not_fitted("EnsembleGcn"))
    }

    /// Mean of member logits for the fitted feature matrix.
    fn mean_logits(&self) -> Result<Matrix<f32>> {
        let st = self.state()?;
        let mut sum: Option<Matrix<f32>> = None;
        for member in &self.members {
            let logits = member.logits_with(&st.x)?;
            sum = Some(match sum {
                Some(acc) => acc
                    .add(&logits)
                    .expect("members produce same-shaped logits"),
                None => logits,
            });
        }
        #[allow(clippy::cast_precision_loss)]
        let scale = 1.0 / self.members.len() as f32;
        Ok(sum.expect("fitted ensemble has at least one member").mul_scalar(scale))
    }
}

impl GraphClassifier for EnsembleGcn {
    fn fit(
        &mut self,
        x: &Matrix<f32>,
        y: &[usize],
        a: &Matrix<f32>,
        train_indexes: &[usize],
    ) -> Result<FitSummary> {
        if self.config.n_estimators == 0 {
            return Err(AsediarError::InvalidHyperparameter {
                param: "n_estimators".to_string(),
                value: "0".to_string(),
                constraint: "at least one member".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.config.edge_sample_prob) {
            return Err(AsediarError::InvalidHyperparameter {
                param: "edge_sample_prob".to_string(),
                value: self.config.edge_sample_prob.to_string(),
                constraint: "must be in [0, 1]".to_string(),
            });
        }

        self.members = Vec::with_capacity(self.config.n_estimators);
        let mut last = FitSummary {
            epochs_run: 0,
            loss: 0.0,
            converged: false,
        };

        for m in 0..self.config.n_estimators {
            let seed = self.config.base.seed + m as u64;
            // sampler seeded per member so edge subsets are reproducible
            let mut sampler = GraphAdjacency::new(1).with_seed(seed);
            let sampled = sampler.sample_edges(a, self.config.edge_sample_prob)?;

            let mut config = self.config.base.clone();
            config.seed = seed;

            let mut member = GcnModel::new(config);
            last = member.fit(x, y, &sampled, train_indexes)?;
            log::debug!(
                "member {m}: {} epochs, loss {:.6}",
                last.epochs_run,
                last.loss
            );
            self.members.push(member);
        }

        let n_classes = self.members[0].n_classes()?;
        self.fitted = Some(EnsembleFitted {
            x: x.clone(),
            y: y.to_vec(),
            n_classes,
            train_indexes: train_indexes.to_vec(),
        });

        Ok(last)
    }

    fn decision_function(&self) -> Result<Matrix<f32>> {
        Ok(softmax_rows(&self.mean_logits()?))
    }

    fn predict(&self) -> Result<Vec<usize>> {
        let logits = self.mean_logits()?;
        Ok(crate::gcn::argmax_rows(&logits))
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
        let st = self.state()?;
        let x = st.x.clone();

        let mut sum = vec![0.0_f32; x.n_cols()];
        for member in &self.members {
            let grad = member.attack_gradient_with(&x, target, attacker, label_new, label_old)?;
            for (acc, g) in sum.iter_mut().zip(grad.iter()) {
                *acc += g;
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let scale = 1.0 / self.members.len() as f32;
        for v in &mut sum {
            *v *= scale;
        }
        Ok(Vector::from_vec(sum))
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
            .ok_or_else(|| AsediarError::not_fitted("EnsembleGcn"))?;
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
