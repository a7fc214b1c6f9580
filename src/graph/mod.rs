//! Graph construction and spectral preprocessing.
//!
//! [`adjacency`] builds k-nearest-neighbor adjacency matrices from feature
//! matrices and supports randomized edge sampling for ensemble members.
//! [`spectral`] produces the symmetric normalization `Â = D^{-1/2} A D^{-1/2}`
//! consumed by graph convolution layers.

pub mod adjacency;
pub mod spectral;

pub use adjacency::GraphAdjacency;
