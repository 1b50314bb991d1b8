use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use super::event_store::EventStore;
use crate::event::Event;
use crate::probability::log_probabilities_into;

/// Compute the empirical expectation of every (predicate, label) pair.
///
/// Cell `[p][l]` is the sum of `occurrence_count * value` over events with
/// label `l` on which predicate `p` is active. Cells without support are set
/// to `smoothing_floor`, so the result never contains a zero.
pub fn observation_expectations(store: &EventStore, smoothing_floor: f64) -> Array2<f64> {
    let mut expectations = Array2::zeros((store.num_predicates(), store.num_labels()));
    for event in store.events() {
        let label = event.label() as usize;
        let count = f64::from(event.occurrence_count());
        for (predicate, value) in event.iter() {
            expectations[[predicate as usize, label]] += count * value;
        }
    }
    expectations.mapv_inplace(|v| if v > 0.0 { v } else { smoothing_floor });
    expectations
}

/// Number of events each worker scores, so that at most `num_workers`
/// chunks cover `num_events`.
fn worker_chunk_size(num_events: usize, num_workers: usize) -> usize {
    let num_workers = num_workers.max(1);
    ((num_events + num_workers - 1) / num_workers).max(1)
}

/// Score `events` and add their model expectations to `expectations`.
fn accumulate_chunk(
    events: &[Event],
    parameters: ArrayView2<'_, f64>,
    smoothing_floor: f64,
    expectations: &mut Array2<f64>,
) -> f64 {
    let mut probs = vec![0.0; parameters.ncols()];
    let mut log_likelihood = 0.0;
    for event in events {
        log_probabilities_into(event, parameters, smoothing_floor, &mut probs);
        let count = f64::from(event.occurrence_count());
        log_likelihood += count * probs[event.label() as usize];
        probs.iter_mut().for_each(|p| *p = p.exp());

        for (predicate, value) in event.iter() {
            let mass = count * value;
            let mut row = expectations.row_mut(predicate as usize);
            for (cell, &p) in row.iter_mut().zip(probs.iter()) {
                *cell += mass * p;
            }
        }
    }
    log_likelihood
}

/// Accumulate the model expectation of every (predicate, label) pair into
/// `expectations` and return the log-likelihood of the training data.
///
/// Every event is scored under `parameters`; its occurrence count times the
/// probability of each label times the predicate value is added to
/// `[predicate][label]`. The log-likelihood is the sum of
/// `occurrence_count * ln P(label | event)` for the observed labels.
///
/// The events are split into one contiguous chunk per worker thread. The
/// first chunk accumulates straight into `expectations`, every other chunk
/// into a private partial matrix, so at most `workers - 1` partials are alive.
/// Partials are added in chunk order once all workers are done. The caller
/// owns `expectations` and must clear it between epochs.
pub fn accumulate_model_expectations(
    store: &EventStore,
    parameters: ArrayView2<'_, f64>,
    smoothing_floor: f64,
    expectations: &mut Array2<f64>,
) -> f64 {
    let events = store.events();
    let shape = expectations.raw_dim();
    let chunk_size = worker_chunk_size(events.len(), rayon::current_num_threads());
    let (head, tail) = events.split_at(chunk_size.min(events.len()));

    let (head_log_likelihood, partials) = rayon::join(
        || accumulate_chunk(head, parameters, smoothing_floor, expectations),
        || {
            tail.par_chunks(chunk_size)
                .map(|chunk| {
                    let mut local = Array2::zeros(shape);
                    let ll = accumulate_chunk(chunk, parameters, smoothing_floor, &mut local);
                    (local, ll)
                })
                .collect::<Vec<_>>()
        },
    );

    let mut log_likelihood = head_log_likelihood;
    for (partial, ll) in &partials {
        *expectations += partial;
        log_likelihood += ll;
    }
    log_likelihood
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_expectations() {
        let events = vec![
            Event::binary(0, vec![0, 1], 2).unwrap(),
            Event::new(1, vec![1], Some(vec![0.5]), 3).unwrap(),
        ];
        let store = EventStore::new(events, 3, 2).unwrap();
        let obs = observation_expectations(&store, 0.1);

        assert_eq!(obs.dim(), (3, 2));
        assert_eq!(obs[[0, 0]], 2.0);
        assert_eq!(obs[[0, 1]], 0.1);
        assert_eq!(obs[[1, 0]], 2.0);
        assert_eq!(obs[[1, 1]], 1.5);
        // predicate 2 never occurs
        assert_eq!(obs[[2, 0]], 0.1);
        assert_eq!(obs[[2, 1]], 0.1);
    }

    #[test]
    fn test_zero_valued_predicate_is_floored() {
        let events = vec![Event::new(0, vec![0], Some(vec![0.0]), 1).unwrap()];
        let store = EventStore::new(events, 1, 1).unwrap();
        let obs = observation_expectations(&store, 0.25);
        assert_eq!(obs[[0, 0]], 0.25);
    }

    #[test]
    fn test_model_expectations_with_uniform_parameters() {
        let events = vec![
            Event::binary(0, vec![0], 1).unwrap(),
            Event::binary(1, vec![0], 1).unwrap(),
        ];
        let store = EventStore::new(events, 1, 2).unwrap();
        let params = Array2::zeros((1, 2));
        let mut model = Array2::zeros((1, 2));
        let ll = accumulate_model_expectations(&store, params.view(), 0.1, &mut model);

        // each event spreads one unit of mass evenly over both labels
        assert!((model[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((model[[0, 1]] - 1.0).abs() < 1e-12);
        assert!((ll - 2.0 * 0.5_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_model_expectations_weighted_by_count_and_value() {
        let events = vec![Event::new(0, vec![0, 1], Some(vec![2.0, 1.0]), 3).unwrap()];
        let store = EventStore::new(events, 2, 2).unwrap();
        let params = Array2::zeros((2, 2));
        let mut model = Array2::zeros((2, 2));
        accumulate_model_expectations(&store, params.view(), 0.1, &mut model);

        assert!((model[[0, 0]] - 3.0).abs() < 1e-12);
        assert!((model[[0, 1]] - 3.0).abs() < 1e-12);
        assert!((model[[1, 0]] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_model_expectations_match_sequential_sum() {
        let events: Vec<Event> = (0..1000)
            .map(|i| Event::binary(i % 3, vec![i % 5, (i * 7) % 5], 1 + i % 2).unwrap())
            .collect();
        let store = EventStore::new(events, 5, 3).unwrap();
        let params = Array2::from_shape_fn((5, 3), |(p, l)| (p as f64 - l as f64) * 0.1);

        let mut parallel = Array2::zeros((5, 3));
        let ll = accumulate_model_expectations(&store, params.view(), 0.1, &mut parallel);

        let mut sequential = Array2::<f64>::zeros((5, 3));
        let mut expected_ll = 0.0;
        for event in store.events() {
            let probs = crate::probability::score_event(event, params.view(), 0.1);
            let count = f64::from(event.occurrence_count());
            expected_ll += count * probs[event.label() as usize].ln();
            for (p, v) in event.iter() {
                for (l, prob) in probs.iter().enumerate() {
                    sequential[[p as usize, l]] += count * prob * v;
                }
            }
        }

        for (a, b) in parallel.iter().zip(sequential.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        assert!((ll - expected_ll).abs() < 1e-9);
    }

    #[test]
    fn test_partials_are_bounded_by_workers() {
        for &(num_events, workers) in &[(10_000, 8), (7, 8), (1, 1), (33, 4), (0, 16)] {
            let chunk_size = worker_chunk_size(num_events, workers);
            let chunks = (num_events + chunk_size - 1) / chunk_size;
            assert!(chunks <= workers, "{} events on {} workers", num_events, workers);
        }
        assert_eq!(worker_chunk_size(10_000, 8), 1250);
        assert_eq!(worker_chunk_size(10, 0), 10);
    }

    #[test]
    fn test_model_expectations_independent_of_thread_count() {
        let events: Vec<Event> = (0..500)
            .map(|i| {
                let values = vec![0.5 + (i % 4) as f64, 1.0];
                Event::new(i % 4, vec![i % 7, 7 + i % 3], Some(values), 1 + i % 3).unwrap()
            })
            .collect();
        let store = EventStore::new(events, 10, 4).unwrap();
        let params = Array2::from_shape_fn((10, 4), |(p, l)| ((p * 3 + l) % 5) as f64 * 0.2 - 0.4);

        let run = |threads: usize| {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap();
            pool.install(|| {
                let mut model = Array2::zeros((10, 4));
                let ll = accumulate_model_expectations(&store, params.view(), 0.1, &mut model);
                (model, ll)
            })
        };
        let (single, single_ll) = run(1);
        for threads in [2, 3, 8] {
            let (multi, multi_ll) = run(threads);
            for (a, b) in single.iter().zip(multi.iter()) {
                assert!((a - b).abs() < 1e-9, "{} threads", threads);
            }
            assert!((single_ll - multi_ll).abs() < 1e-9);
        }
    }
}
