//! k-nearest-neighbor adjacency construction from feature matrices.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{AsediarError, Result};
use crate::primitives::Matrix;

/// Builds graph adjacency matrices from node features.
///
/// Nodes are connected to their `n_neighbors` nearest neighbors by Euclidean
/// distance over range-normalized features, then the adjacency is symmetrized
/// so that an edge in either direction becomes mutual. Each node is its own
/// nearest neighbor at distance zero, so the neighbor budget includes self:
/// `n_neighbors = 1` keeps every node isolated and `n_neighbors = k` links a
/// node to at most `k - 1` others.
///
/// # Example
///
/// ```
/// use asediar::graph::GraphAdjacency;
/// use asediar::primitives::Matrix;
///
/// let x = Matrix::from_vec(3, 1, vec![0.0, 1.0, 10.0]).unwrap();
/// let mut builder = GraphAdjacency::new(2).with_seed(42);
/// let a = builder.build_adjacency(&x).unwrap();
///
/// // nearest neighbors link 0 and 1, symmetrized
/// assert_eq!(a.get(0, 1), 1.0);
/// assert_eq!(a.get(1, 0), 1.0);
/// ```
#[derive(Debug)]
pub struct GraphAdjacency {
    n_neighbors: usize,
    weighted: bool,
    sigma2: f32,
    self_loops: bool,
    rng: StdRng,
}

impl GraphAdjacency {
    /// Create a builder connecting each node to its `n_neighbors` nearest
    /// neighbors, the node itself included.
    ///
    /// Defaults: unweighted edges, `sigma2 = 1.0`, no self-loops, seed 42.
    #[must_use]
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors,
            weighted: false,
            sigma2: 1.0,
            self_loops: false,
            rng: StdRng::seed_from_u64(42),
        }
    }

    /// Weight edges by the Gaussian kernel `exp(-d² / sigma2)` instead of 1.
    #[must_use]
    pub fn weighted(mut self, sigma2: f32) -> Self {
        self.weighted = true;
        self.sigma2 = sigma2;
        self
    }

    /// Add self-loops (identity) to the built adjacency.
    #[must_use]
    pub fn with_self_loops(mut self) -> Self {
        self.self_loops = true;
        self
    }

    /// Seed the random generator used by [`GraphAdjacency::sample_edges`].
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Build the symmetric kNN adjacency matrix for feature matrix `x`
    /// (`n_nodes x n_features`).
    ///
    /// Features are range-normalized per column before distances are
    /// computed, so no single wide-ranged feature dominates the metric.
    ///
    /// # Errors
    ///
    /// Returns [`AsediarError::InvalidHyperparameter`] if `n_neighbors` is
    /// zero or exceeds the node count, or if the Gaussian bandwidth is not
    /// positive.
    pub fn build_adjacency(&mut self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let n = x.n_rows();
        if self.n_neighbors == 0 || self.n_neighbors > n {
            return Err(AsediarError::InvalidHyperparameter {
                param: "n_neighbors".to_string(),
                value: self.n_neighbors.to_string(),
                constraint: format!("must be in 1..={n} for {n} nodes"),
            });
        }
        if self.weighted && self.sigma2 <= 0.0 {
            return Err(AsediarError::InvalidHyperparameter {
                param: "sigma2".to_string(),
                value: self.sigma2.to_string(),
                constraint: "must be positive".to_string(),
            });
        }

        let scaled = range_normalize(x);
        let dist2 = pairwise_sq_distances(&scaled);

        let mut a = Matrix::zeros(n, n);
        for i in 0..n {
            // self sits in the candidate list at distance zero and consumes
            // one slot of the neighbor budget; no edge is written for it
            let mut order: Vec<usize> = (0..n).collect();
            // stable sort keeps index order on ties, so results are
            // deterministic for duplicated feature rows
            order.sort_by(|&p, &q| {
                dist2
                    .get(i, p)
                    .partial_cmp(&dist2.get(i, q))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            for &j in order.iter().take(self.n_neighbors) {
                if j == i {
                    continue;
                }
                let w = if self.weighted {
                    (-dist2.get(i, j) / self.sigma2).exp()
                } else {
                    1.0
                };
                a.set(i, j, w);
            }
        }

        // OR-symmetrize: an edge in either direction becomes mutual
        for i in 0..n {
            for j in (i + 1)..n {
                let w = a.get(i, j).max(a.get(j, i));
                a.set(i, j, w);
                a.set(j, i, w);
            }
        }

        if self.self_loops {
            for i in 0..n {
                a.set(i, i, 1.0);
            }
        }

        Ok(a)
    }

    /// Randomly keep a fraction `prob` of the undirected edges of `a`.
    ///
    /// Edges are counted once per undirected pair; `floor(prob * |E|)` of
    /// them survive, chosen by the builder's seeded generator. The diagonal
    /// is carried over unchanged so self-loops are never dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AsediarError::InvalidHyperparameter`] if `prob` is outside
    /// `[0, 1]`, or [`AsediarError::DimensionMismatch`] if `a` is not square.
    pub fn sample_edges(&mut self, a: &Matrix<f32>, prob: f32) -> Result<Matrix<f32>> {
        if !(0.0..=1.0).contains(&prob) {
            return Err(AsediarError::InvalidHyperparameter {
                param: "prob".to_string(),
                value: prob.to_string(),
                constraint: "must be in [0, 1]".to_string(),
            });
        }
        let n = a.n_rows();
        if a.n_cols() != n {
            return Err(AsediarError::DimensionMismatch {
                expected: format!("{n}x{n} square adjacency"),
                actual: format!("{}x{}", a.n_rows(), a.n_cols()),
            });
        }

        let mut edges: Vec<(usize, usize)> = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if a.get(i, j) != 0.0 {
                    edges.push((i, j));
                }
            }
        }

        edges.shuffle(&mut self.rng);
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let keep = (prob * edges.len() as f32).floor() as usize;
        edges.truncate(keep);

        let mut sampled = Matrix::zeros(n, n);
        for (i, j) in edges {
            let w = a.get(i, j);
            sampled.set(i, j, w);
            sampled.set(j, i, w);
        }
        for i in 0..n {
            sampled.set(i, i, a.get(i, i));
        }

        Ok(sampled)
    }
}

/// Scale each column to `[0, 1]`. Constant columns map to zero.
fn range_normalize(x: &Matrix<f32>) -> Matrix<f32> {
    let (rows, cols) = x.shape();
    let mut out = Matrix::zeros(rows, cols);
    for j in 0..cols {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for i in 0..rows {
            let v = x.get(i, j);
            min = min.min(v);
            max = max.max(v);
        }
        let span = max - min;
        if span > 0.0 {
            for i in 0..rows {
                out.set(i, j, (x.get(i, j) - min) / span);
            }
        }
    }
    out
}

/// Squared Euclidean distance between every pair of rows.
fn pairwise_sq_distances(x: &Matrix<f32>) -> Matrix<f32> {
    let n = x.n_rows();
    let mut d = Matrix::zeros(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            let dist: f32 = x
                .row_slice(i)
                .iter()
                .zip(x.row_slice(j))
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            d.set(i, j, dist);
            d.set(j, i, dist);
        }
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_features() -> Matrix<f32> {
        // four nodes on a line: 0 - 1 - 2 - 3
        Matrix::from_vec(4, 1, vec![0.0, 1.0, 2.0, 3.0]).unwrap()
    }

    #[test]
    fn test_knn_adjacency_is_symmetric() {
        let mut builder = GraphAdjacency::new(2);
        let a = builder.build_adjacency(&line_features()).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(a.get(i, j), a.get(j, i));
            }
        }
    }

    #[test]
    fn test_knn_connects_nearest() {
        // k = 2 means self plus one external neighbor
        let mut builder = GraphAdjacency::new(2);
        let a = builder.build_adjacency(&line_features()).unwrap();
        // endpoints pick their single chain neighbor
        assert_eq!(a.get(0, 1), 1.0);
        assert_eq!(a.get(3, 2), 1.0);
        // no long-range edges
        assert_eq!(a.get(0, 3), 0.0);
    }

    #[test]
    fn test_single_neighbor_keeps_nodes_isolated() {
        // the node itself fills the whole budget at k = 1
        let x = Matrix::from_vec(3, 1, vec![0.0, 1.0, 2.0]).unwrap();
        let mut builder = GraphAdjacency::new(1);
        let a = builder.build_adjacency(&x).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(a.get(i, j), 0.0);
            }
        }
    }

    #[test]
    fn test_neighbor_count_may_equal_node_count() {
        // k = n keeps every node, giving the complete graph
        let mut builder = GraphAdjacency::new(4);
        let a = builder.build_adjacency(&line_features()).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                if i != j {
                    assert_eq!(a.get(i, j), 1.0);
                }
            }
        }
    }

    #[test]
    fn test_no_self_loops_by_default() {
        let mut builder = GraphAdjacency::new(3);
        let a = builder.build_adjacency(&line_features()).unwrap();
        for i in 0..4 {
            assert_eq!(a.get(i, i), 0.0);
        }
    }

    #[test]
    fn test_self_loops_set_diagonal() {
        let mut builder = GraphAdjacency::new(2).with_self_loops();
        let a = builder.build_adjacency(&line_features()).unwrap();
        for i in 0..4 {
            assert_eq!(a.get(i, i), 1.0);
        }
    }

    #[test]
    fn test_weighted_edges_in_unit_interval() {
        let mut builder = GraphAdjacency::new(3).weighted(0.5);
        let a = builder.build_adjacency(&line_features()).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                if i != j && a.get(i, j) != 0.0 {
                    assert!(a.get(i, j) > 0.0 && a.get(i, j) <= 1.0);
                }
            }
        }
        // closer pairs carry heavier weights
        assert!(a.get(0, 1) > a.get(0, 2));
    }

    #[test]
    fn test_tie_break_is_deterministic() {
        // nodes 1 and 2 are equidistant from node 0
        let x = Matrix::from_vec(3, 1, vec![0.5, 0.0, 1.0]).unwrap();
        let mut b1 = GraphAdjacency::new(2);
        let mut b2 = GraphAdjacency::new(2);
        let a1 = b1.build_adjacency(&x).unwrap();
        let a2 = b2.build_adjacency(&x).unwrap();
        assert_eq!(a1.as_slice(), a2.as_slice());
        // stable sort keeps the lower index first
        assert_eq!(a1.get(0, 1), 1.0);
    }

    #[test]
    fn test_rejects_zero_neighbors() {
        let mut builder = GraphAdjacency::new(0);
        let err = builder.build_adjacency(&line_features()).unwrap_err();
        assert!(matches!(err, AsediarError::InvalidHyperparameter { .. }));
    }

    #[test]
    fn test_rejects_more_neighbors_than_nodes() {
        let mut builder = GraphAdjacency::new(5);
        assert!(builder.build_adjacency(&line_features()).is_err());
    }

    #[test]
    fn test_sample_edges_prob_one_keeps_all() {
        let mut builder = GraphAdjacency::new(2);
        let a = builder.build_adjacency(&line_features()).unwrap();
        let sampled = builder.sample_edges(&a, 1.0).unwrap();
        assert_eq!(sampled.as_slice(), a.as_slice());
    }

    #[test]
    fn test_sample_edges_prob_zero_keeps_none() {
        let mut builder = GraphAdjacency::new(2).with_self_loops();
        let a = builder.build_adjacency(&line_features()).unwrap();
        let sampled = builder.sample_edges(&a, 0.0).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                if i == j {
                    assert_eq!(sampled.get(i, i), 1.0); // loops survive
                } else {
                    assert_eq!(sampled.get(i, j), 0.0);
                }
            }
        }
    }

    #[test]
    fn test_sample_edges_result_is_symmetric() {
        let mut builder = GraphAdjacency::new(3).with_seed(7);
        let a = builder.build_adjacency(&line_features()).unwrap();
        let sampled = builder.sample_edges(&a, 0.5).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(sampled.get(i, j), sampled.get(j, i));
            }
        }
    }

    #[test]
    fn test_sample_edges_count() {
        let mut builder = GraphAdjacency::new(3).with_seed(3);
        let a = builder.build_adjacency(&line_features()).unwrap();
        let total: usize = (0..4)
            .flat_map(|i| ((i + 1)..4).map(move |j| (i, j)))
            .filter(|&(i, j)| a.get(i, j) != 0.0)
            .count();

        let sampled = builder.sample_edges(&a, 0.5).unwrap();
        let kept: usize = (0..4)
            .flat_map(|i| ((i + 1)..4).map(move |j| (i, j)))
            .filter(|&(i, j)| sampled.get(i, j) != 0.0)
            .count();
        assert_eq!(kept, total / 2);
    }

    #[test]
    fn test_sample_edges_rejects_bad_prob() {
        let mut builder = GraphAdjacency::new(2);
        let a = builder.build_adjacency(&line_features()).unwrap();
        assert!(builder.sample_edges(&a, 1.5).is_err());
        assert!(builder.sample_edges(&a, -0.1).is_err());
    }

    #[test]
    fn test_constant_column_ignored() {
        // second feature is constant and must not affect distances
        let x = Matrix::from_vec(3, 2, vec![0.0, 9.0, 1.0, 9.0, 5.0, 9.0]).unwrap();
        let mut builder = GraphAdjacency::new(2);
        let a = builder.build_adjacency(&x).unwrap();
        assert_eq!(a.get(0, 1), 1.0);
        assert_eq!(a.get(0, 2), 0.0);
    }
}
