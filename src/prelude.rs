//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use asediar::prelude::*;
//! ```

pub use crate::attack::{AttackOutcome, AttackSearch, AttackSuggestion};
pub use crate::ensemble::{EnsembleConfig, EnsembleGcn};
pub use crate::error::{AsediarError, Result};
pub use crate::gcn::{Activation, GcnConfig, GcnModel, OptimizerKind};
pub use crate::graph::{spectral, GraphAdjacency};
pub use crate::metrics::{accuracy, f1_score, Average};
pub use crate::primitives::{Matrix, Vector};
pub use crate::traits::{FitSummary, GraphClassifier};
