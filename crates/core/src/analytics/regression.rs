use serde::{Deserialize, Serialize};

use crate::errors::AnalyticsError;

/// Below this, the regressor is treated as constant and no line can be fit.
const MIN_REGRESSOR_SPREAD: f64 = 1e-10;

/// Ordinary least squares line `y = intercept + slope * x`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn fit(points: &[(f64, f64)]) -> Result<Self, AnalyticsError> {
        if points.len() < 2 {
            return Err(AnalyticsError::InsufficientData { required: 2, available: points.len() });
        }
        if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(AnalyticsError::ComputationFailure(
                "observations must be finite numbers".to_string(),
            ));
        }

        let n = points.len() as f64;
        let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n;
        let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (x, y) in points {
            numerator += (x - x_mean) * (y - y_mean);
            denominator += (x - x_mean) * (x - x_mean);
        }

        if denominator.abs() < MIN_REGRESSOR_SPREAD {
            return Err(AnalyticsError::ComputationFailure(
                "regressor has zero variance".to_string(),
            ));
        }

        let slope = numerator / denominator;
        Ok(Self { slope, intercept: y_mean - slope * x_mean })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}
