use std::time::Duration;

use crate::error::{GisError, Result};

/// GIS training parameters.
#[derive(Debug, Clone)]
pub struct GisParams {
    smoothing_floor: f64,
    convergence_threshold: f64,
    newton_iterations: usize,
    gaussian_variance: f64,
    use_gaussian_smoothing: bool,
    max_iterations: usize,
    num_threads: usize,
    time_limit: Option<Duration>,
}

impl Default for GisParams {
    fn default() -> Self {
        Self {
            smoothing_floor: 0.1,
            convergence_threshold: 0.0001,
            newton_iterations: 50,
            gaussian_variance: 0.5,
            use_gaussian_smoothing: false,
            max_iterations: 100,
            num_threads: 0,
            time_limit: None,
        }
    }
}

impl GisParams {
    /// Value substituted for unseen (predicate, label) observation
    /// expectations and for non-positive feature values when scoring.
    pub fn smoothing_floor(&self) -> f64 {
        self.smoothing_floor
    }

    pub fn set_smoothing_floor(&mut self, smoothing_floor: f64) -> Result<()> {
        if !(smoothing_floor > 0.0) || !smoothing_floor.is_finite() {
            return Err(GisError::config("smoothing_floor must be positive"));
        }
        self.smoothing_floor = smoothing_floor;
        Ok(())
    }

    /// Threshold for both the log-likelihood stopping rule and the Newton
    /// iteration of the smoothed update.
    pub fn convergence_threshold(&self) -> f64 {
        self.convergence_threshold
    }

    pub fn set_convergence_threshold(&mut self, convergence_threshold: f64) -> Result<()> {
        if !(convergence_threshold >= 0.0) {
            return Err(GisError::config("convergence_threshold must be non-negative"));
        }
        self.convergence_threshold = convergence_threshold;
        Ok(())
    }

    pub fn newton_iterations(&self) -> usize {
        self.newton_iterations
    }

    pub fn set_newton_iterations(&mut self, newton_iterations: usize) -> Result<()> {
        if newton_iterations < 1 {
            return Err(GisError::config("newton_iterations must be at least 1"));
        }
        self.newton_iterations = newton_iterations;
        Ok(())
    }

    pub fn gaussian_variance(&self) -> f64 {
        self.gaussian_variance
    }

    pub fn set_gaussian_variance(&mut self, gaussian_variance: f64) -> Result<()> {
        if !(gaussian_variance > 0.0) || !gaussian_variance.is_finite() {
            return Err(GisError::config("gaussian_variance must be positive"));
        }
        self.gaussian_variance = gaussian_variance;
        Ok(())
    }

    pub fn use_gaussian_smoothing(&self) -> bool {
        self.use_gaussian_smoothing
    }

    pub fn set_use_gaussian_smoothing(&mut self, enabled: bool) {
        self.use_gaussian_smoothing = enabled;
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) -> Result<()> {
        if max_iterations < 1 {
            return Err(GisError::config("max_iterations must be at least 1"));
        }
        self.max_iterations = max_iterations;
        Ok(())
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Set the number of worker threads.
    ///
    /// Zero runs on the global rayon pool.
    pub fn set_num_threads(&mut self, num_threads: usize) {
        self.num_threads = num_threads;
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    /// Set a wall-clock budget, checked after every epoch.
    pub fn set_time_limit(&mut self, time_limit: Option<Duration>) {
        self.time_limit = time_limit;
    }
}
