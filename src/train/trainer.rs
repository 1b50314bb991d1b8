use std::time::{Duration, Instant};

use ndarray::{Array2, ArrayView2};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use super::event_store::EventStore;
use super::expectation::{accumulate_model_expectations, observation_expectations};
use super::params::GisParams;
use super::updater::{update_parameters, UpdateStats};
use crate::cancel::CancellationToken;
use crate::error::{GisError, Result};
use crate::model::GisModel;

/// Lifecycle of a training session.
///
/// A session starts in `Iterating` once initialization succeeded. Every other
/// state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    /// More epochs may run
    Iterating,
    /// The log-likelihood gain fell below the convergence threshold
    Converged,
    /// The iteration budget is exhausted
    MaxIterationsReached,
    /// The cancellation token was triggered
    Cancelled,
    /// The wall-clock budget is exhausted
    TimeLimitReached,
    /// A non-finite value appeared; the session cannot continue
    Diverged,
}

impl TrainingState {
    /// Whether the session has stopped
    pub fn is_terminal(self) -> bool {
        self != TrainingState::Iterating
    }
}

/// What one epoch produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    /// 1-based epoch number
    pub epoch: usize,
    /// Log-likelihood of the training data under the parameters the epoch started with
    pub log_likelihood: f64,
    /// Counters from the parameter update
    pub stats: UpdateStats,
    /// State after the epoch
    pub state: TrainingState,
}

/// Result of a complete training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// The trained model
    pub model: GisModel,
    /// Why training stopped
    pub state: TrainingState,
    /// Log-likelihood of every epoch, in order
    pub log_likelihoods: Vec<f64>,
}

/// One GIS training run over an event store
///
/// Construction computes the scaling constant and the observation
/// expectations and zero-initializes the parameters. Each call to
/// [`epoch`](Self::epoch) scores every event, updates the parameters and
/// applies the stopping rule. A model can be taken at any point; with no
/// epochs run it has all-zero parameters.
pub struct Session<'a> {
    store: &'a EventStore,
    params: GisParams,
    /// Scaling constant C
    c: f64,
    observation: Array2<f64>,
    /// Per-epoch buffer, cleared before every scoring pass
    model_expectation: Array2<f64>,
    parameters: Array2<f64>,
    log_likelihoods: Vec<f64>,
    state: TrainingState,
    /// Epoch and quantity of a detected divergence
    divergence: Option<(usize, String)>,
    pool: Option<ThreadPool>,
    cancel: Option<CancellationToken>,
    started: Instant,
}

impl<'a> Session<'a> {
    /// Initialize a session.
    ///
    /// Fails with [`GisError::Configuration`] when no event carries any
    /// feature mass, which leaves the scaling constant undefined.
    pub fn new(store: &'a EventStore, params: GisParams) -> Result<Self> {
        let c = store.scaling_constant();
        if !(c > 0.0) || !c.is_finite() {
            return Err(GisError::config(
                "no event has active feature mass, the scaling constant is undefined",
            ));
        }

        let pool = if params.num_threads() > 0 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(params.num_threads())
                .build()
                .map_err(|e| GisError::config(format!("cannot build thread pool: {}", e)))?;
            Some(pool)
        } else {
            None
        };

        info!(
            events = store.num_events(),
            occurrences = store.total_occurrences(),
            predicates = store.num_predicates(),
            labels = store.num_labels(),
            c,
            smoothing = params.use_gaussian_smoothing(),
            "initializing GIS training"
        );
        let observation = observation_expectations(store, params.smoothing_floor());
        let shape = (store.num_predicates(), store.num_labels());

        Ok(Self {
            store,
            params,
            c,
            observation,
            model_expectation: Array2::zeros(shape),
            parameters: Array2::zeros(shape),
            log_likelihoods: Vec::new(),
            state: TrainingState::Iterating,
            divergence: None,
            pool,
            cancel: None,
            started: Instant::now(),
        })
    }

    /// Check `token` after every epoch.
    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancel = Some(token);
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// The scaling constant C
    pub fn scaling_constant(&self) -> f64 {
        self.c
    }

    pub fn params(&self) -> &GisParams {
        &self.params
    }

    /// Log-likelihood of every finished epoch
    pub fn log_likelihoods(&self) -> &[f64] {
        &self.log_likelihoods
    }

    pub fn observation_expectations(&self) -> ArrayView2<'_, f64> {
        self.observation.view()
    }

    /// Model expectations computed by the last epoch
    pub fn model_expectations(&self) -> ArrayView2<'_, f64> {
        self.model_expectation.view()
    }

    pub fn parameters(&self) -> ArrayView2<'_, f64> {
        self.parameters.view()
    }

    /// Run `op` on the dedicated pool when one is configured.
    fn install<R: Send, F: FnOnce() -> R + Send>(pool: &Option<ThreadPool>, op: F) -> R {
        match pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    fn diverged(&mut self, epoch: usize, quantity: &str) -> GisError {
        warn!(epoch, quantity, "numerical divergence");
        self.state = TrainingState::Diverged;
        self.divergence = Some((epoch, quantity.to_string()));
        GisError::NumericalDivergence {
            epoch,
            quantity: quantity.to_string(),
        }
    }

    /// Run one epoch.
    pub fn epoch(&mut self) -> Result<EpochReport> {
        if self.state.is_terminal() {
            return Err(GisError::config(format!(
                "training session already finished ({:?})",
                self.state
            )));
        }
        let epoch = self.log_likelihoods.len() + 1;
        let floor = self.params.smoothing_floor();

        self.model_expectation.fill(0.0);
        let log_likelihood = {
            let store = self.store;
            let parameters = self.parameters.view();
            let expectations = &mut self.model_expectation;
            Self::install(&self.pool, || {
                accumulate_model_expectations(store, parameters, floor, expectations)
            })
        };
        if !log_likelihood.is_finite() {
            return Err(self.diverged(epoch, "log-likelihood"));
        }

        let stats = {
            let parameters = &mut self.parameters;
            let observation = &self.observation;
            let model = &self.model_expectation;
            let c = self.c;
            let params = &self.params;
            Self::install(&self.pool, || {
                update_parameters(parameters, observation, model, c, params)
            })
        };
        if self.parameters.iter().any(|w| !w.is_finite()) {
            return Err(self.diverged(epoch, "parameter matrix"));
        }
        if stats.skipped_cells > 0 {
            debug!(
                epoch,
                cells = stats.skipped_cells,
                "cells without model expectation left unchanged"
            );
        }
        if stats.unconverged_cells > 0 {
            debug!(
                epoch,
                cells = stats.unconverged_cells,
                "newton iteration budget exhausted"
            );
        }

        self.log_likelihoods.push(log_likelihood);
        info!(epoch, log_likelihood, "epoch finished");

        self.state = self.next_state();
        if self.state.is_terminal() {
            info!(epoch, state = ?self.state, "training stopped");
        }

        Ok(EpochReport {
            epoch,
            log_likelihood,
            stats,
            state: self.state,
        })
    }

    /// Stopping rule, evaluated after every epoch
    fn next_state(&self) -> TrainingState {
        let history = &self.log_likelihoods;
        let n = history.len();
        // needs two earlier samples, so the first check is after epoch 3
        if n >= 3 && history[n - 1] - history[n - 2] < self.params.convergence_threshold() {
            return TrainingState::Converged;
        }
        if n >= self.params.max_iterations() {
            return TrainingState::MaxIterationsReached;
        }
        if self.cancel.as_ref().map_or(false, |t| t.is_cancelled()) {
            return TrainingState::Cancelled;
        }
        if let Some(limit) = self.params.time_limit() {
            if self.started.elapsed() >= limit {
                return TrainingState::TimeLimitReached;
            }
        }
        TrainingState::Iterating
    }

    /// Run epochs until a terminal state.
    pub fn run(&mut self) -> Result<TrainingState> {
        while !self.state.is_terminal() {
            self.epoch()?;
        }
        Ok(self.state)
    }

    /// Snapshot the current parameters as a model.
    ///
    /// A diverged session has no usable parameters; this returns the same
    /// [`GisError::NumericalDivergence`] the failing epoch did.
    pub fn model(&self) -> Result<GisModel> {
        if let Some((epoch, quantity)) = &self.divergence {
            return Err(GisError::NumericalDivergence {
                epoch: *epoch,
                quantity: quantity.clone(),
            });
        }
        GisModel::new(
            1.0 / self.c,
            self.parameters.clone(),
            self.store.predicates().iter().copied().collect(),
            self.store.labels().iter().copied().collect(),
            self.params.smoothing_floor(),
        )
    }
}

/// GIS trainer
///
/// Holds the training configuration and drives [`Session`]s to completion.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    /// Training parameters
    params: GisParams,
    /// Checked once per epoch
    cancel: Option<CancellationToken>,
}

impl Trainer {
    /// Create a new trainer with default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Get training parameters
    pub fn params(&self) -> &GisParams {
        &self.params
    }

    /// Get training parameters for mutation
    pub fn params_mut(&mut self) -> &mut GisParams {
        &mut self.params
    }

    /// Set maximum iterations (builder pattern)
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Result<Self> {
        self.params.set_max_iterations(max_iterations)?;
        Ok(self)
    }

    /// Enable or disable Gaussian smoothing (builder pattern)
    pub fn with_gaussian_smoothing(mut self, enabled: bool) -> Self {
        self.params.set_use_gaussian_smoothing(enabled);
        self
    }

    /// Set the convergence threshold (builder pattern)
    pub fn with_convergence_threshold(mut self, threshold: f64) -> Result<Self> {
        self.params.set_convergence_threshold(threshold)?;
        Ok(self)
    }

    /// Set the number of worker threads (builder pattern)
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.params.set_num_threads(num_threads);
        self
    }

    /// Set a wall-clock budget (builder pattern)
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.params.set_time_limit(Some(limit));
        self
    }

    /// Attach a cancellation token (builder pattern)
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Start a step-wise training session.
    pub fn session<'a>(&self, store: &'a EventStore) -> Result<Session<'a>> {
        let mut session = Session::new(store, self.params.clone())?;
        if let Some(token) = &self.cancel {
            session.set_cancellation(token.clone());
        }
        Ok(session)
    }

    /// Train until convergence or until a budget runs out.
    pub fn train(&self, store: &EventStore) -> Result<TrainingOutcome> {
        let mut session = self.session(store)?;
        let state = session.run()?;
        Ok(TrainingOutcome {
            model: session.model()?,
            state,
            log_likelihoods: session.log_likelihoods.clone(),
        })
    }

    /// Train for at most `num_iterations` epochs with or without Gaussian
    /// smoothing, keeping every other parameter of this trainer.
    pub fn train_iterations(
        &self,
        store: &EventStore,
        num_iterations: usize,
        use_gaussian_smoothing: bool,
    ) -> Result<GisModel> {
        let mut trainer = self.clone();
        trainer.params.set_max_iterations(num_iterations)?;
        trainer.params.set_use_gaussian_smoothing(use_gaussian_smoothing);
        Ok(trainer.train(store)?.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn store() -> EventStore {
        let events = vec![
            Event::binary(0, vec![0, 1], 3).unwrap(),
            Event::binary(1, vec![0, 2], 2).unwrap(),
            Event::binary(1, vec![2], 4).unwrap(),
            Event::binary(0, vec![1], 1).unwrap(),
        ];
        EventStore::new(events, 3, 2).unwrap()
    }

    #[test]
    fn test_session_initialization() {
        let store = store();
        let session = Session::new(&store, GisParams::default()).unwrap();
        assert_eq!(session.state(), TrainingState::Iterating);
        assert_eq!(session.scaling_constant(), 2.0);
        assert!(session.parameters().iter().all(|&w| w == 0.0));
        assert_eq!(session.observation_expectations()[[0, 0]], 3.0);
        assert_eq!(session.observation_expectations()[[1, 1]], 0.1);
    }

    #[test]
    fn test_session_rejects_massless_corpus() {
        let events = vec![Event::binary(0, vec![], 1).unwrap()];
        let store = EventStore::new(events, 1, 2).unwrap();
        let err = Session::new(&store, GisParams::default()).err().unwrap();
        assert!(matches!(err, GisError::Configuration(_)));
    }

    #[test]
    fn test_stopping_rule_waits_for_third_epoch() {
        let store = store();
        let mut params = GisParams::default();
        // any gain counts as converged
        params.set_convergence_threshold(1e9).unwrap();
        let mut session = Session::new(&store, params).unwrap();

        assert_eq!(session.epoch().unwrap().state, TrainingState::Iterating);
        assert_eq!(session.epoch().unwrap().state, TrainingState::Iterating);
        assert_eq!(session.epoch().unwrap().state, TrainingState::Converged);
        assert!(session.epoch().is_err());
    }

    #[test]
    fn test_max_iterations() {
        let store = store();
        let mut params = GisParams::default();
        params.set_max_iterations(2).unwrap();
        let mut session = Session::new(&store, params).unwrap();
        assert_eq!(session.run().unwrap(), TrainingState::MaxIterationsReached);
        assert_eq!(session.log_likelihoods().len(), 2);
    }

    #[test]
    fn test_cancellation_stops_after_epoch() {
        let store = store();
        let token = CancellationToken::new();
        let trainer = Trainer::new().with_cancellation(token.clone());
        let mut session = trainer.session(&store).unwrap();
        token.cancel();
        let report = session.epoch().unwrap();
        assert_eq!(report.state, TrainingState::Cancelled);
        assert_eq!(session.run().unwrap(), TrainingState::Cancelled);
    }

    #[test]
    fn test_time_limit() {
        let store = store();
        let trainer = Trainer::new().with_time_limit(Duration::from_secs(0));
        let outcome = trainer.train(&store).unwrap();
        assert_eq!(outcome.state, TrainingState::TimeLimitReached);
        assert_eq!(outcome.log_likelihoods.len(), 1);
    }

    #[test]
    fn test_dedicated_pool_matches_global_pool() {
        let store = store();
        let global = Trainer::new().with_max_iterations(5).unwrap();
        let local = global.clone().with_num_threads(2);
        let a = global.train(&store).unwrap().model;
        let b = local.train(&store).unwrap().model;
        for (x, y) in a.parameters().iter().zip(b.parameters().iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_overflowing_scores_diverge_in_log_likelihood() {
        let events = vec![Event::new(0, vec![0], Some(vec![10.0]), 1).unwrap()];
        let store = EventStore::new(events, 1, 2).unwrap();
        let mut session = Session::new(&store, GisParams::default()).unwrap();
        // weight times value overflows to an infinite score
        session.parameters[[0, 0]] = 1e308;

        let err = session.epoch().unwrap_err();
        assert!(matches!(
            &err,
            GisError::NumericalDivergence { epoch: 1, quantity } if quantity == "log-likelihood"
        ));
        assert_eq!(session.state(), TrainingState::Diverged);
        assert!(session.log_likelihoods().is_empty());

        let err = session.model().unwrap_err();
        assert!(matches!(
            &err,
            GisError::NumericalDivergence { epoch: 1, quantity } if quantity == "log-likelihood"
        ));
    }

    #[test]
    fn test_train_iterations_rejects_zero() {
        let store = store();
        let err = Trainer::new().train_iterations(&store, 0, false).unwrap_err();
        assert!(matches!(err, GisError::Configuration(_)));
    }
}
