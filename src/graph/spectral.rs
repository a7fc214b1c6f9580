//! Symmetric spectral normalization of adjacency matrices.

use crate::error::{AsediarError, Result};
use crate::primitives::{Matrix, Vector};

/// Compute degrees and the normalized adjacency `Â = D^{-1/2} A D^{-1/2}`.
///
/// The degree of node `i` is its row sum. Returns the degree vector together
/// with the normalized matrix; normalization preserves symmetry of `a`.
///
/// # Errors
///
/// Returns [`AsediarError::DimensionMismatch`] if `a` is not square, or
/// [`AsediarError::DegenerateDegree`] naming the first isolated node whose
/// degree is not positive.
pub fn normalize(a: &Matrix<f32>) -> Result<(Vector<f32>, Matrix<f32>)> {
    let n = a.n_rows();
    if a.n_cols() != n {
        return Err(AsediarError::DimensionMismatch {
            expected: format!("{n}x{n} square adjacency"),
            actual: format!("{}x{}", a.n_rows(), a.n_cols()),
        });
    }

    let mut degrees = Vec::with_capacity(n);
    for i in 0..n {
        let d: f32 = a.row_slice(i).iter().sum();
        if d <= 0.0 {
            return Err(AsediarError::DegenerateDegree { node: i });
        }
        degrees.push(d);
    }

    let inv_sqrt: Vec<f32> = degrees.iter().map(|d| 1.0 / d.sqrt()).collect();
    let mut a_hat = Matrix::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            let v = a.get(i, j);
            if v != 0.0 {
                a_hat.set(i, j, inv_sqrt[i] * v * inv_sqrt[j]);
            }
        }
    }

    Ok((Vector::from_vec(degrees), a_hat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_two_node_path() {
        // A = [[0, 1], [1, 0]], degrees 1, Â = A
        let a = Matrix::from_vec(2, 2, vec![0.0, 1.0, 1.0, 0.0]).unwrap();
        let (degrees, a_hat) = normalize(&a).unwrap();
        assert_eq!(degrees.as_slice(), &[1.0, 1.0]);
        assert_eq!(a_hat.as_slice(), a.as_slice());
    }

    #[test]
    fn test_normalize_scales_by_degree() {
        // triangle with self-loops: every degree is 3
        let a = Matrix::from_vec(3, 3, vec![1.0; 9]).unwrap();
        let (degrees, a_hat) = normalize(&a).unwrap();
        assert_eq!(degrees.as_slice(), &[3.0, 3.0, 3.0]);
        for v in a_hat.as_slice() {
            assert!((v - 1.0 / 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalize_preserves_symmetry() {
        let a = Matrix::from_vec(
            3,
            3,
            vec![1.0, 0.5, 0.0, 0.5, 1.0, 2.0, 0.0, 2.0, 1.0],
        )
        .unwrap();
        let (_, a_hat) = normalize(&a).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert!((a_hat.get(i, j) - a_hat.get(j, i)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_isolated_node_is_rejected() {
        let a = Matrix::from_vec(2, 2, vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        let err = normalize(&a).unwrap_err();
        assert!(matches!(err, AsediarError::DegenerateDegree { node: 1 }));
    }

    #[test]
    fn test_non_square_is_rejected() {
        let a = Matrix::from_vec(2, 3, vec![0.0; 6]).unwrap();
        assert!(matches!(
            normalize(&a).unwrap_err(),
            AsediarError::DimensionMismatch { .. }
        ));
    }
}
