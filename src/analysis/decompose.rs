use serde::Serialize;

use crate::error::{DashboardError, Result};

/// Classical additive decomposition: `observed = trend + seasonal + residual`.
///
/// `trend` and `residual` are `None` for the first and last `period / 2`
/// observations, where the centred moving average is not defined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decomposition {
    pub period: usize,
    pub observed: Vec<f64>,
    pub trend: Vec<Option<f64>>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<Option<f64>>,
}

/// Decompose an evenly spaced series with the given seasonal `period`.
///
/// Needs `period >= 2` and at least two full periods of data.
pub fn seasonal_decompose(values: &[f64], period: usize) -> Result<Decomposition> {
    if period < 2 {
        return Err(DashboardError::InsufficientData(format!(
            "seasonal period must be at least 2, got {period}"
        )));
    }
    let n = values.len();
    if n < 2 * period {
        return Err(DashboardError::InsufficientData(format!(
            "seasonal decomposition with period {period} needs {} observations, have {n}",
            2 * period
        )));
    }

    // Centred moving average; an even period uses a 2 x period window.
    let weights: Vec<f64> = if period % 2 == 0 {
        let mut w = vec![1.0 / period as f64; period + 1];
        w[0] = 0.5 / period as f64;
        w[period] = 0.5 / period as f64;
        w
    } else {
        vec![1.0 / period as f64; period]
    };
    let half = weights.len() / 2;

    let trend: Vec<Option<f64>> = (0..n)
        .map(|t| {
            if t < half || t + half >= n {
                return None;
            }
            let window = &values[t - half..=t + half];
            Some(window.iter().zip(&weights).map(|(v, w)| v * w).sum())
        })
        .collect();

    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (t, tr) in trend.iter().enumerate() {
        if let Some(tr) = tr {
            sums[t % period] += values[t] - tr;
            counts[t % period] += 1;
        }
    }
    let mut phase_means: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &c)| if c == 0 { 0.0 } else { s / c as f64 })
        .collect();
    let centre = phase_means.iter().sum::<f64>() / period as f64;
    for m in &mut phase_means {
        *m -= centre;
    }

    let seasonal: Vec<f64> = (0..n).map(|t| phase_means[t % period]).collect();
    let residual = trend
        .iter()
        .enumerate()
        .map(|(t, tr)| tr.map(|tr| values[t] - tr - seasonal[t]))
        .collect();

    Ok(Decomposition {
        period,
        observed: values.to_vec(),
        trend,
        seasonal,
        residual,
    })
}
