//! Asediar: Graph convolutional networks and adversarial attacks in pure Rust.
//!
//! Asediar trains graph convolutional networks (GCNs) for semi-supervised
//! node classification and probes their robustness with gradient-guided
//! feature attacks. Graphs are built from raw feature matrices with a
//! k-nearest-neighbor construction, models train over the spectral
//! normalization `Â = D^{-1/2} A D^{-1/2}`, and attacks find the smallest
//! single-node feature change that flips a target node's prediction.
//!
//! # Quick Start
//!
//! ```
//! use asediar::prelude::*;
//!
//! // two clusters of nodes around the origin, one labeled node per cluster
//! let x = Matrix::from_vec(6, 2, vec![
//!     -1.0, -1.0,
//!     -0.9, -1.0,
//!     -1.0, -0.9,
//!      1.0,  1.0,
//!      0.9,  1.0,
//!      1.0,  0.9,
//! ]).unwrap();
//! let y = vec![0, 0, 0, 1, 1, 1];
//!
//! let mut builder = GraphAdjacency::new(3).with_self_loops();
//! let a = builder.build_adjacency(&x).unwrap();
//!
//! let mut model = GcnModel::new(GcnConfig {
//!     learning_rate: 0.5,
//!     max_epochs: 300,
//!     ..GcnConfig::default()
//! });
//! model.fit(&x, &y, &a, &[0, 3]).unwrap();
//! assert_eq!(model.predict().unwrap(), y);
//!
//! // attack: flip node 2's label by perturbing node 1's features
//! let mut search = AttackSearch::new(&mut model, vec![2], vec![1])
//!     .with_search_range(0.0, 50.0);
//! let outcome = search.run().unwrap();
//! assert!(outcome.is_some());
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: Core Vector and Matrix types
//! - [`autograd`]: Tape-based reverse-mode automatic differentiation
//! - [`graph`]: kNN adjacency construction and spectral normalization
//! - [`gcn`]: The GCN model, weight initialization, and optimizers
//! - [`ensemble`]: Ensembles of GCNs over sampled edge subsets
//! - [`attack`]: Gradient-guided adversarial feature attacks
//! - [`metrics`]: Accuracy and F1 evaluation
//! - [`config`]: Experiment-level options

#![allow(clippy::module_name_repetitions)]

pub mod attack;
pub mod autograd;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod gcn;
pub mod graph;
pub mod metrics;
pub mod prelude;
pub mod primitives;
pub mod traits;
