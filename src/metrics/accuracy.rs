use crate::error::{LayerError, Result};
use crate::tensors::{Ten64, Tensor};

const TOP_K: usize = 5;

/// Fraction of entries where `round(y_pred)` equals `y_true`, per sample.
pub fn binary_accuracy(y_true: &Ten64, y_pred: &Ten64) -> Result<Ten64> {
    let hits = y_true.equal(&y_pred.round())?;
    let axis = hits.last_axis("binary_accuracy")?;
    hits.mean_axis(axis, false)
}

/// `1.0` where the arg-max of `y_pred` matches the arg-max of one-hot `y_true`.
pub fn categorical_accuracy(y_true: &Ten64, y_pred: &Ten64) -> Result<Ten64> {
    let t = y_true.argmax_axis(y_true.last_axis("categorical_accuracy")?, false)?;
    let p = y_pred.argmax_axis(y_pred.last_axis("categorical_accuracy")?, false)?;
    t.equal(&p)
}

/// `1.0` where the arg-max of `y_pred` equals the integer label in `y_true`.
pub fn sparse_categorical_accuracy(y_true: &Ten64, y_pred: &Ten64) -> Result<Ten64> {
    let t = y_true.max_axis(y_true.last_axis("sparse_categorical_accuracy")?, false)?;
    let p = y_pred.argmax_axis(y_pred.last_axis("sparse_categorical_accuracy")?, false)?;
    t.equal(&p)
}

/// `1.0` where the true class (arg-max of `y_true`) is among the five highest
/// scores of `y_pred`. Scores tied with the boundary count as inside.
pub fn top_k_categorical_accuracy(y_true: &Ten64, y_pred: &Ten64) -> Result<Ten64> {
    if y_true.shape != y_pred.shape || y_pred.shape.last().is_none_or(|&w| w == 0) {
        return Err(LayerError::ShapeMismatch {
            op: "top_k_categorical_accuracy",
            lhs: y_true.shape.clone(),
            rhs: y_pred.shape.clone(),
        });
    }
    let classes = y_true.argmax_axis(y_true.rank() - 1, false)?;
    let width = y_pred.shape[y_pred.rank() - 1];

    let data = y_pred
        .data
        .chunks(width)
        .zip(&classes.data)
        .map(|(row, &class)| {
            let target = row[class as usize];
            let above = row.iter().filter(|&&x| x > target).count();
            if above < TOP_K { 1.0 } else { 0.0 }
        })
        .collect();

    Ok(Tensor::new(classes.shape, data))
}

/// Picks an accuracy flavour from the shapes involved.
///
/// - one prediction column: [`binary_accuracy`]
/// - one label column: [`sparse_categorical_accuracy`]
/// - otherwise: [`categorical_accuracy`]
pub fn generic_accuracy(y_true: &Ten64, y_pred: &Ten64) -> Result<Ten64> {
    if y_pred.dim(1) == Some(1) {
        return binary_accuracy(y_true, y_pred);
    }
    if y_true.dim(-1) == Some(1) {
        return sparse_categorical_accuracy(y_true, y_pred);
    }
    categorical_accuracy(y_true, y_pred)
}
