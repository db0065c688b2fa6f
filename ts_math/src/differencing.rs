//! Differencing and integration of univariate series

use crate::{MathError, Result};

/// Apply `order` rounds of first differencing
pub fn difference(values: &[f64], order: usize) -> Vec<f64> {
    let mut current = values.to_vec();
    for _ in 0..order {
        current = current.windows(2).map(|w| w[1] - w[0]).collect();
    }
    current
}

/// Undo `order` rounds of differencing for values forecast past the end of `history`.
///
/// `forecasts` are on the `order`-times differenced scale; each level is
/// re-accumulated from the last observed value at that level.
pub fn integrate(forecasts: &[f64], history: &[f64], order: usize) -> Result<Vec<f64>> {
    if history.len() <= order {
        return Err(MathError::InsufficientData(format!(
            "Need more than {} observations to integrate {} differences",
            order, order
        )));
    }

    let mut current = forecasts.to_vec();
    for level in (0..order).rev() {
        let observed = difference(history, level);
        let mut acc = observed.last().copied().ok_or_else(|| {
            MathError::CalculationError(format!("Differenced level {} is empty", level))
        })?;
        current = current
            .into_iter()
            .map(|step| {
                acc += step;
                acc
            })
            .collect();
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difference_orders() {
        let values = [1.0, 3.0, 6.0, 10.0, 15.0];
        assert_eq!(difference(&values, 0), values.to_vec());
        assert_eq!(difference(&values, 1), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(difference(&values, 2), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_integrate_continues_series() {
        let history = [1.0, 3.0, 6.0, 10.0, 15.0];
        // Second differences stay at 1, so the series continues 21, 28, 36.
        let restored = integrate(&[1.0, 1.0, 1.0], &history, 2).unwrap();
        assert_eq!(restored, vec![21.0, 28.0, 36.0]);
    }

    #[test]
    fn test_integrate_needs_history() {
        assert!(integrate(&[1.0], &[2.0], 1).is_err());
    }
}
