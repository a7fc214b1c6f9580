//! Run-level options for GCN experiments.

use serde::{Deserialize, Serialize};

use crate::ensemble::EnsembleConfig;
use crate::gcn::GcnConfig;

/// Options describing one experiment run: dataset, graph construction,
/// model family, and output naming.
///
/// [`GcnOptions::name_prefix`] produces a stable identifier for result
/// files, encoding the model family and its key hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcnOptions {
    /// Dataset name.
    pub dataset: String,
    /// Directory where generated metrics are stored.
    pub results_dir: String,
    /// Random seed so results can be replicated.
    pub rand_seed: u64,
    /// Whether to use an ensemble instead of a single model.
    pub ensemble: bool,
    /// Probability for edge sampling in ensemble members.
    pub edge_sample_prob: f32,
    /// Number of members for the ensemble.
    pub n_estimators: usize,
    /// Number of nearest neighbors when building the graph.
    pub n_neighbors: usize,
    /// Max training epochs.
    pub n_epochs: usize,
    /// Batch size, kept for interface parity; training is full-batch.
    pub train_batch_size: usize,
    /// File path for debug logs; empty means stderr.
    pub log_file: String,
    /// Whether to emit debug-level output.
    pub debug: bool,
    /// Whether downstream tooling should plot figures.
    pub plot: bool,
}

impl Default for GcnOptions {
    fn default() -> Self {
        Self {
            dataset: "airline".to_string(),
            results_dir: "./temp".to_string(),
            rand_seed: 42,
            ensemble: false,
            edge_sample_prob: 0.6,
            n_estimators: 1,
            n_neighbors: 5,
            n_epochs: 5000,
            train_batch_size: 25,
            log_file: String::new(),
            debug: false,
            plot: false,
        }
    }
}

impl GcnOptions {
    /// Identifier prefix for result files.
    ///
    /// # Example
    ///
    /// ```
    /// use asediar::config::GcnOptions;
    ///
    /// let opts = GcnOptions::default();
    /// assert_eq!(opts.name_prefix(), "airline_gcn_nn5");
    /// ```
    #[must_use]
    pub fn name_prefix(&self) -> String {
        let algo = if self.ensemble {
            let prob = format!("_e{:.2}", self.edge_sample_prob).replace('.', "");
            format!("egcn_m{}{prob}", self.n_estimators)
        } else {
            "gcn".to_string()
        };
        format!("{}_{algo}_nn{}", self.dataset, self.n_neighbors)
    }

    /// Model hyperparameters implied by these options.
    #[must_use]
    pub fn model_config(&self) -> GcnConfig {
        GcnConfig {
            max_epochs: self.n_epochs,
            seed: self.rand_seed,
            ..GcnConfig::default()
        }
    }

    /// Ensemble hyperparameters implied by these options.
    #[must_use]
    pub fn ensemble_config(&self) -> EnsembleConfig {
        EnsembleConfig {
            n_estimators: self.n_estimators,
            edge_sample_prob: self.edge_sample_prob,
            base: self.model_config(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_name_prefix() {
        let opts = GcnOptions::default();
        assert_eq!(opts.name_prefix(), "airline_gcn_nn5");
    }

    #[test]
    fn test_ensemble_name_prefix() {
        let opts = GcnOptions {
            ensemble: true,
            n_estimators: 3,
            edge_sample_prob: 0.6,
            ..GcnOptions::default()
        };
        assert_eq!(opts.name_prefix(), "airline_egcn_m3_e060_nn5");
    }

    #[test]
    fn test_configs_inherit_options() {
        let opts = GcnOptions {
            rand_seed: 7,
            n_epochs: 100,
            n_estimators: 4,
            ..GcnOptions::default()
        };
        let config = opts.model_config();
        assert_eq!(config.seed, 7);
        assert_eq!(config.max_epochs, 100);

        let ensemble = opts.ensemble_config();
        assert_eq!(ensemble.n_estimators, 4);
        assert_eq!(ensemble.base.seed, 7);
    }
}
