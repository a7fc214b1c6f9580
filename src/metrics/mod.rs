//! Classification metrics for node predictions.

/// Averaging strategy for multi-class metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Average {
    /// Global counts across all classes. For single-label classification
    /// this equals accuracy.
    Micro,
    /// Unweighted mean of per-class scores.
    Macro,
    /// Mean of per-class scores weighted by class support in `y_true`.
    Weighted,
}

/// Fraction of predictions matching the true labels.
///
/// # Panics
///
/// Panics if the slices have different lengths.
#[must_use]
pub fn accuracy(y_pred: &[usize], y_true: &[usize]) -> f32 {
    assert_eq!(
        y_pred.len(),
        y_true.len(),
        "prediction and label counts must match"
    );
    if y_pred.is_empty() {
        return 0.0;
    }

    let correct = y_pred
        .iter()
        .zip(y_true.iter())
        .filter(|(p, t)| p == t)
        .count();
    #[allow(clippy::cast_precision_loss)]
    {
        correct as f32 / y_pred.len() as f32
    }
}

/// F1 score with the chosen averaging strategy.
///
/// # Example
///
/// ```
/// use asediar::metrics::{f1_score, Average};
///
/// let y_true = vec![0, 1, 1, 0];
/// let y_pred = vec![0, 1, 0, 0];
/// let f1 = f1_score(&y_pred, &y_true, Average::Micro);
/// assert!((f1 - 0.75).abs() < 1e-6);
/// ```
///
/// # Panics
///
/// Panics if the slices have different lengths.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn f1_score(y_pred: &[usize], y_true: &[usize], average: Average) -> f32 {
    assert_eq!(
        y_pred.len(),
        y_true.len(),
        "prediction and label counts must match"
    );
    if y_pred.is_empty() {
        return 0.0;
    }

    // micro-averaged precision and recall coincide in single-label
    // classification, so micro F1 reduces to accuracy
    if average == Average::Micro {
        return accuracy(y_pred, y_true);
    }

    let n_classes = y_pred
        .iter()
        .chain(y_true.iter())
        .max()
        .map_or(0, |&m| m + 1);

    let mut total = 0.0_f32;
    for class in 0..n_classes {
        let tp = count(y_pred, y_true, |p, t| p == class && t == class);
        let fp = count(y_pred, y_true, |p, t| p == class && t != class);
        let fn_ = count(y_pred, y_true, |p, t| p != class && t == class);

        let denom = 2 * tp + fp + fn_;
        if denom == 0 {
            continue;
        }
        let class_f1 = 2.0 * tp as f32 / denom as f32;
        let weight = match average {
            Average::Weighted => (tp + fn_) as f32 / y_true.len() as f32,
            _ => 1.0,
        };
        total += class_f1 * weight;
    }

    match average {
        Average::Weighted => total,
        _ => total / n_classes as f32,
    }
}

/// F1 score restricted to the predictions at `indexes`.
///
/// Used to score a model on its labeled training subset.
///
/// # Panics
///
/// Panics if any index is out of bounds.
#[must_use]
pub fn f1_score_subset(
    y_pred: &[usize],
    y_true: &[usize],
    indexes: &[usize],
    average: Average,
) -> f32 {
    let pred: Vec<usize> = indexes.iter().map(|&i| y_pred[i]).collect();
    let truth: Vec<usize> = indexes.iter().map(|&i| y_true[i]).collect();
    f1_score(&pred, &truth, average)
}

fn count(y_pred: &[usize], y_true: &[usize], pred: impl Fn(usize, usize) -> bool) -> usize {
    y_pred
        .iter()
        .zip(y_true.iter())
        .filter(|&(&p, &t)| pred(p, t))
        .count()
}
