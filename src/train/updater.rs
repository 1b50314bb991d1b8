use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{Array2, Zip};

use super::params::GisParams;

/// Constant curvature term added to the derivative of the smoothed update.
///
/// It is fixed and does not follow `gaussian_variance`.
const NEWTON_CURVATURE: f64 = 20.0;

/// Result of solving the smoothed update for one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonSolution {
    /// The parameter increment
    pub delta: f64,
    /// Newton steps taken
    pub iterations: usize,
    /// Whether two successive iterates came within the threshold
    pub converged: bool,
}

/// Counters reported by one parameter update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Cells left unchanged because their model expectation was zero
    pub skipped_cells: usize,
    /// Cells whose Newton iteration hit the iteration budget
    pub unconverged_cells: usize,
}

/// Closed-form GIS increment `ln(observation / model) / C`.
///
/// Returns `None` when the model expectation is zero: no event gave the cell
/// any probability mass, and the cell is left unchanged for this epoch.
#[inline]
pub fn closed_form_delta(observation: f64, model: f64, c_inverse: f64) -> Option<f64> {
    if model == 0.0 {
        return None;
    }
    Some(c_inverse * (observation / model).ln())
}

/// Solve the Gaussian-smoothed update for one cell with Newton's method.
///
/// Finds `delta` with
/// `exp(C * delta) * model + (parameter + delta) / variance - observation = 0`,
/// starting from zero. The derivative used is
/// `exp(C * delta) * model * C + 20`. Iteration stops once two successive
/// iterates differ by less than `threshold`, checked from the second step on.
pub fn newton_delta(
    parameter: f64,
    observation: f64,
    model: f64,
    c: f64,
    variance: f64,
    max_iterations: usize,
    threshold: f64,
) -> NewtonSolution {
    let penalty = 1.0 / variance;
    let mut delta = 0.0;
    for i in 0..max_iterations {
        let prev = delta;
        let scaled = (c * delta).exp() * model;
        let f = scaled + (parameter + delta) * penalty - observation;
        let f_derivative = scaled * c + NEWTON_CURVATURE;
        delta -= f / f_derivative;

        if i > 0 && (delta - prev).abs() < threshold {
            return NewtonSolution {
                delta,
                iterations: i + 1,
                converged: true,
            };
        }
    }
    NewtonSolution {
        delta,
        iterations: max_iterations,
        converged: false,
    }
}

/// Update every parameter cell from the observation and model expectations.
///
/// Cells are independent and are updated in parallel. With Gaussian
/// smoothing disabled each cell gets the closed-form increment, otherwise the
/// Newton solution of the smoothed equation.
pub fn update_parameters(
    parameters: &mut Array2<f64>,
    observation: &Array2<f64>,
    model: &Array2<f64>,
    c: f64,
    params: &GisParams,
) -> UpdateStats {
    let skipped = AtomicUsize::new(0);
    let unconverged = AtomicUsize::new(0);

    if params.use_gaussian_smoothing() {
        let variance = params.gaussian_variance();
        let max_iterations = params.newton_iterations();
        let threshold = params.convergence_threshold();
        Zip::from(parameters)
            .and(observation)
            .and(model)
            .par_for_each(|w, &obs, &exp| {
                let solution = newton_delta(*w, obs, exp, c, variance, max_iterations, threshold);
                if !solution.converged {
                    unconverged.fetch_add(1, Ordering::Relaxed);
                }
                *w += solution.delta;
            });
    } else {
        let c_inverse = 1.0 / c;
        Zip::from(parameters)
            .and(observation)
            .and(model)
            .par_for_each(|w, &obs, &exp| match closed_form_delta(obs, exp, c_inverse) {
                Some(delta) => *w += delta,
                None => {
                    skipped.fetch_add(1, Ordering::Relaxed);
                }
            });
    }

    UpdateStats {
        skipped_cells: skipped.into_inner(),
        unconverged_cells: unconverged.into_inner(),
    }
}
