//! Gradient-guided adversarial feature attacks on fitted graph classifiers.
//!
//! The attack flips a target node's predicted label by modifying the feature
//! row of a single attacker node. Candidate attackers are ranked by the
//! gradient of the logit gap between the target's second-best and best
//! labels; the smallest sufficient modification along that gradient is then
//! found by bisection.
//!
//! Works against any [`GraphClassifier`], so single models and ensembles are
//! attacked through the same code path.
//!
//! # Reference
//!
//! Zügner, Akbarnejad, Günnemann (2018). Adversarial Attacks on Neural
//! Networks for Graph Data. KDD.

use crate::error::{AsediarError, Result};
use crate::primitives::Vector;
use crate::traits::GraphClassifier;

/// Gradient evaluated for one candidate attacker node.
#[derive(Debug, Clone)]
pub struct CandidateGradient {
    /// Candidate attacker node.
    pub attack_node: usize,
    /// Feature index with the largest absolute gradient.
    pub feature: usize,
    /// Gradient of the logit gap with respect to the attacker's features.
    pub gradient: Vector<f32>,
}

/// Best attack found by [`AttackSearch::suggest_node`].
#[derive(Debug, Clone)]
pub struct AttackSuggestion {
    /// Node whose prediction the attack targets.
    pub target: usize,
    /// The target's current predicted label.
    pub old_label: usize,
    /// Label the attack pushes the target toward.
    pub new_label: usize,
    /// Attacker node whose features will be modified.
    pub attack_node: usize,
    /// Feature index with the largest absolute gradient.
    pub feature: usize,
    /// Search direction for the modification.
    pub gradient: Vector<f32>,
}

/// Completed attack: suggestion plus the minimal modification found.
#[derive(Debug, Clone)]
pub struct AttackOutcome {
    /// The suggestion the modification was searched along.
    pub suggestion: AttackSuggestion,
    /// Feature row for the attacker node that flips the target's label.
    pub modified_value: Vector<f32>,
}

/// Bisection search for minimal adversarial feature modifications.
pub struct AttackSearch<'a, M: GraphClassifier> {
    model: &'a mut M,
    target_nodes: Vec<usize>,
    attack_nodes: Vec<usize>,
    min_prod: f32,
    max_prod: f32,
    max_iters: usize,
}

impl<'a, M: GraphClassifier> AttackSearch<'a, M> {
    /// Create a search over the given target and attacker candidates.
    ///
    /// Defaults: modification magnitudes in `[0, 5]` gradient units, 20
    /// bisection iterations.
    pub fn new(model: &'a mut M, target_nodes: Vec<usize>, attack_nodes: Vec<usize>) -> Self {
        Self {
            model,
            target_nodes,
            attack_nodes,
            min_prod: 0.0,
            max_prod: 5.0,
            max_iters: 20,
        }
    }

    /// Set the magnitude bracket searched by bisection.
    #[must_use]
    pub fn with_search_range(mut self, min_prod: f32, max_prod: f32) -> Self {
        self.min_prod = min_prod;
        self.max_prod = max_prod;
        self
    }

    /// Set the bisection iteration cap.
    #[must_use]
    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Rank attacker candidates for the first target node.
    ///
    /// For every candidate, computes the gradient of
    /// `logit[target, second_best] - logit[target, best]` with respect to the
    /// candidate's feature row. The candidate with the largest absolute
    /// gradient component wins; `None` if no candidate has a nonzero
    /// gradient or either node list is empty.
    ///
    /// # Errors
    ///
    /// Returns [`AsediarError::NotFitted`] if the model has not been fitted.
    pub fn suggest_node(
        &mut self,
    ) -> Result<(Option<AttackSuggestion>, Vec<CandidateGradient>)> {
        if self.target_nodes.is_empty() || self.attack_nodes.is_empty() {
            return Ok((None, Vec::new()));
        }

        let probs = self.model.decision_function()?;
        let target = self.target_nodes[0];
        if target >= probs.n_rows() {
            return Err(AsediarError::index_out_of_bounds(target, probs.n_rows()));
        }
        let (old_label, new_label) = top_two(probs.row_slice(target));

        let mut best: Option<AttackSuggestion> = None;
        let mut best_grad = 0.0_f32;
        let mut candidates = Vec::with_capacity(self.attack_nodes.len());

        for &attack_node in &self.attack_nodes {
            let gradient =
                self.model
                    .attack_gradient(target, attack_node, new_label, old_label)?;
            let feature = argmax_abs(gradient.as_slice());
            log::debug!(
                "attack_node: {attack_node}, old_label: {old_label}, new_label: {new_label}, \
                 best_feature: {feature}"
            );

            let magnitude = gradient[feature].abs();
            if magnitude > best_grad {
                best_grad = magnitude;
                best = Some(AttackSuggestion {
                    target,
                    old_label,
                    new_label,
                    attack_node,
                    feature,
                    gradient: gradient.clone(),
                });
            }
            candidates.push(CandidateGradient {
                attack_node,
                feature,
                gradient,
            });
        }

        Ok((best, candidates))
    }

    /// Overwrite a node's feature row, predict all labels, and restore the
    /// row.
    ///
    /// # Errors
    ///
    /// Propagates model errors; the original row is restored before any
    /// prediction error is returned.
    pub fn modify_and_predict(
        &mut self,
        node: usize,
        node_val: &Vector<f32>,
    ) -> Result<Vec<usize>> {
        let old_val = self.model.feature_row(node)?;
        self.model.set_feature_row(node, node_val)?;
        let predictions = self.model.predict();
        self.model.set_feature_row(node, &old_val)?;
        predictions
    }

    /// Find the smallest modification along `search_direction` for
    /// `mod_node` that flips the target's label away from `old_label`.
    ///
    /// Bisects the step magnitude within the configured bracket, stopping
    /// once a flipping magnitude is within `1e-2` of the bracket top.
    /// Returns the modified feature row, or `None` if the direction is zero
    /// or no magnitude in the bracket flips the label. The model's features
    /// are unchanged on return.
    ///
    /// # Errors
    ///
    /// Propagates model errors from prediction, and rejects a `target_node`
    /// beyond the node count.
    pub fn find_minimum_modification(
        &mut self,
        target_node: usize,
        mod_node: usize,
        old_label: usize,
        search_direction: &Vector<f32>,
    ) -> Result<Option<Vector<f32>>> {
        if search_direction.as_slice().iter().map(|g| g * g).sum::<f32>() == 0.0 {
            // zero direction gives nothing to search along
            return Ok(None);
        }

        let mut min_prod = self.min_prod;
        let mut max_prod = self.max_prod;
        let mut prod = 0.5_f32;

        let orig_val = self.model.feature_row(mod_node)?;
        let mut mod_val: Option<Vector<f32>> = None;

        for _ in 0..self.max_iters {
            let node_val = step_along(&orig_val, search_direction, prod);
            let predictions = self.modify_and_predict(mod_node, &node_val)?;
            let Some(&predicted) = predictions.get(target_node) else {
                return Err(AsediarError::index_out_of_bounds(
                    target_node,
                    predictions.len(),
                ));
            };

            if predicted != old_label {
                mod_val = Some(node_val);
                if max_prod - prod < 1e-2 {
                    break;
                }
                max_prod = prod;
            } else {
                min_prod = prod;
            }
            prod = (min_prod + max_prod) / 2.0;
        }

        log::debug!(
            "prod: {prod}; (max_prod - prod): {}; found: {}",
            max_prod - prod,
            mod_val.is_some()
        );
        Ok(mod_val)
    }

    /// Run the full attack: suggest the best attacker, then search for the
    /// minimal modification along its gradient.
    ///
    /// # Errors
    ///
    /// Propagates model errors from gradient computation or prediction.
    pub fn run(&mut self) -> Result<Option<AttackOutcome>> {
        let (suggestion, _) = self.suggest_node()?;
        let Some(suggestion) = suggestion else {
            return Ok(None);
        };

        let modified = self.find_minimum_modification(
            suggestion.target,
            suggestion.attack_node,
            suggestion.old_label,
            &suggestion.gradient,
        )?;

        Ok(modified.map(|modified_value| AttackOutcome {
            suggestion,
            modified_value,
        }))
    }

    /// Attack by rewiring the adjacency matrix.
    ///
    /// # Errors
    ///
    /// Always returns [`AsediarError::Unsupported`]; structural attacks are
    /// not implemented.
    pub fn modify_structure(&mut self) -> Result<()> {
        Err(AsediarError::Unsupported {
            operation: "modify_structure".to_string(),
        })
    }
}

/// Indexes of the largest and second-largest values.
fn top_two(row: &[f32]) -> (usize, usize) {
    debug_assert!(row.len() >= 2, "need at least two classes to rank");
    let mut order: Vec<usize> = (0..row.len()).collect();
    order.sort_by(|&p, &q| row[q].partial_cmp(&row[p]).unwrap_or(std::cmp::Ordering::Equal));
    (order[0], order[1])
}

fn argmax_abs(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if v.abs() > values[best].abs() {
            best = i;
        }
    }
    best
}

fn step_along(origin: &Vector<f32>, direction: &Vector<f32>, prod: f32) -> Vector<f32> {
    let data: Vec<f32> = origin
        .as_slice()
        .iter()
        .zip(direction.as_slice())
        .map(|(o, d)| o + prod * d)
        .collect();
    Vector::from_vec(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcn::{GcnConfig, GcnModel};
    use crate::graph::GraphAdjacency;
    use crate::primitives::Matrix;

    fn fitted_model() -> GcnModel {
        let x = Matrix::from_vec(
            6,
            2,
            vec![
                -1.0, -1.0, //
                -0.9, -1.0, //
                -1.0, -0.9, //
                1.0, 1.0, //
                0.9, 1.0, //
                1.0, 0.9, //
            ],
        )
        .unwrap();
        let y = vec![0, 0, 0, 1, 1, 1];
        let mut builder = GraphAdjacency::new(3).with_self_loops();
        let a = builder.build_adjacency(&x).unwrap();

        let mut model = GcnModel::new(GcnConfig {
            learning_rate: 0.5,
            max_epochs: 300,
            ..GcnConfig::default()
        });
        model.fit(&x, &y, &a, &[0, 3]).unwrap();
        model
    }

    #[test]
    fn test_suggest_node_finds_candidate() {
        let mut model = fitted_model();
        let mut search = AttackSearch::new(&mut model, vec![2], vec![0, 1]);

        let (best, candidates) = search.suggest_node().unwrap();
        let best = best.expect("connected attackers have nonzero gradients");
        assert_eq!(best.target, 2);
        assert_eq!(best.old_label, 0);
        assert_eq!(best.new_label, 1);
        assert!(candidates.len() == 2);
        assert_eq!(best.gradient.len(), 2);
    }

    #[test]
    fn test_suggest_node_empty_lists_yields_none() {
        let mut model = fitted_model();
        let mut search = AttackSearch::new(&mut model, vec![], vec![0]);
        let (best, candidates) = search.suggest_node().unwrap();
        assert!(best.is_none());
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_zero_direction_returns_none() {
        let mut model = fitted_model();
        let mut search = AttackSearch::new(&mut model, vec![2], vec![1]);
        let zero = Vector::from_slice(&[0.0, 0.0]);
        let result = search.find_minimum_modification(2, 1, 0, &zero).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_find_minimum_modification_restores_features() {
        let mut model = fitted_model();
        let original = model.feature_row(1).unwrap();

        let mut search = AttackSearch::new(&mut model, vec![2], vec![1]);
        let (best, _) = search.suggest_node().unwrap();
        let best = best.unwrap();
        let _ = search
            .find_minimum_modification(best.target, best.attack_node, best.old_label, &best.gradient)
            .unwrap();

        assert_eq!(
            model.feature_row(1).unwrap().as_slice(),
            original.as_slice()
        );
    }

    #[test]
    fn test_full_attack_flips_target_label() {
        let mut model = fitted_model();
        let mut search =
            AttackSearch::new(&mut model, vec![2], vec![1]).with_search_range(0.0, 50.0);

        let outcome = search.run().unwrap().expect("attack should succeed");
        assert_eq!(outcome.suggestion.target, 2);

        // applying the modification flips the target's prediction
        let flipped = search
            .modify_and_predict(outcome.suggestion.attack_node, &outcome.modified_value)
            .unwrap();
        assert_ne!(flipped[2], outcome.suggestion.old_label);

        // without the modification the prediction is unchanged
        assert_eq!(model.predict().unwrap()[2], outcome.suggestion.old_label);
    }

    #[test]
    fn test_bisection_returns_smallest_flipping_magnitude_tried() {
        let mut model = fitted_model();
        let original = model.feature_row(1).unwrap();

        let mut search =
            AttackSearch::new(&mut model, vec![2], vec![1]).with_search_range(0.0, 50.0);
        let (best, _) = search.suggest_node().unwrap();
        let best = best.unwrap();
        let found = search
            .find_minimum_modification(best.target, best.attack_node, best.old_label, &best.gradient)
            .unwrap()
            .expect("a flip exists in the bracket");

        // recover the returned magnitude from the modified row
        let f = best.feature;
        let returned_prod = (found[f] - original[f]) / best.gradient[f];

        // replay the bisection schedule and record every flipping magnitude
        let (mut min_prod, mut max_prod) = (0.0_f32, 50.0_f32);
        let mut prod = 0.5_f32;
        let mut smallest_flip = f32::INFINITY;
        for _ in 0..20 {
            let trial = step_along(&original, &best.gradient, prod);
            let predictions = search.modify_and_predict(1, &trial).unwrap();
            if predictions[2] != best.old_label {
                smallest_flip = smallest_flip.min(prod);
                if max_prod - prod < 1e-2 {
                    break;
                }
                max_prod = prod;
            } else {
                min_prod = prod;
            }
            prod = (min_prod + max_prod) / 2.0;
        }

        assert!(smallest_flip.is_finite());
        assert!((returned_prod - smallest_flip).abs() < 1e-3);
    }

    #[test]
    fn test_no_flip_within_bracket_returns_none() {
        let mut model = fitted_model();
        let mut search = AttackSearch::new(&mut model, vec![2], vec![1]);
        let (best, _) = search.suggest_node().unwrap();
        let best = best.unwrap();

        // a vanishing direction cannot move the logits enough to flip,
        // so bisection exhausts its iterations empty-handed
        let tiny: Vec<f32> = best.gradient.as_slice().iter().map(|g| g * 1e-6).collect();
        let result = search
            .find_minimum_modification(best.target, best.attack_node, best.old_label, &Vector::from_vec(tiny))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_out_of_range_target_is_an_error() {
        let mut model = fitted_model();
        let mut search = AttackSearch::new(&mut model, vec![2], vec![1]);
        let direction = Vector::from_slice(&[1.0, 1.0]);
        let err = search
            .find_minimum_modification(99, 1, 0, &direction)
            .unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
    }

    #[test]
    fn test_modify_and_predict_round_trips_row() {
        let mut model = fitted_model();
        let original = model.feature_row(0).unwrap();

        let mut search = AttackSearch::new(&mut model, vec![2], vec![0]);
        let probe = Vector::from_slice(&[9.0, -9.0]);
        let predictions = search.modify_and_predict(0, &probe).unwrap();
        assert_eq!(predictions.len(), 6);
        assert_eq!(
            model.feature_row(0).unwrap().as_slice(),
            original.as_slice()
        );
    }

    #[test]
    fn test_modify_structure_is_unsupported() {
        let mut model = fitted_model();
        let mut search = AttackSearch::new(&mut model, vec![2], vec![1]);
        assert!(matches!(
            search.modify_structure().unwrap_err(),
            AsediarError::Unsupported { .. }
        ));
    }
}
