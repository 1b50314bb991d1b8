use std::collections::BTreeSet;

use crate::error::{GisError, Result};
use crate::event::Event;

/// The training corpus together with its predicate and label universes
///
/// Every predicate and label ID is checked against the declared universe when
/// the store is built, so the dense matrices used during training can be
/// indexed directly by ID afterwards.
#[derive(Debug, Clone)]
pub struct EventStore {
    /// Training events
    events: Vec<Event>,
    /// Size of the predicate universe (matrix rows)
    num_predicates: usize,
    /// Size of the label universe (matrix columns)
    num_labels: usize,
    /// Predicate IDs active on at least one event
    predicates: BTreeSet<u32>,
    /// Label IDs observed on at least one event
    labels: BTreeSet<u32>,
}

impl EventStore {
    /// Build a store from validated events.
    ///
    /// Fails with [`GisError::Configuration`] for an empty event list or an
    /// empty label universe, and with [`GisError::UnknownId`] when an event
    /// refers to an ID outside `num_predicates` or `num_labels`.
    pub fn new(events: Vec<Event>, num_predicates: usize, num_labels: usize) -> Result<Self> {
        if events.is_empty() {
            return Err(GisError::config("training set contains no events"));
        }
        if num_labels == 0 {
            return Err(GisError::config("label universe is empty"));
        }

        let mut predicates = BTreeSet::new();
        let mut labels = BTreeSet::new();
        for event in &events {
            if event.label() as usize >= num_labels {
                return Err(GisError::UnknownId {
                    kind: "label",
                    id: event.label(),
                    bound: num_labels,
                });
            }
            labels.insert(event.label());
            for &p in event.predicates() {
                if p as usize >= num_predicates {
                    return Err(GisError::UnknownId {
                        kind: "predicate",
                        id: p,
                        bound: num_predicates,
                    });
                }
                predicates.insert(p);
            }
        }

        Ok(Self {
            events,
            num_predicates,
            num_labels,
            predicates,
            labels,
        })
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    pub fn num_predicates(&self) -> usize {
        self.num_predicates
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    /// Predicate IDs active on at least one event
    pub fn predicates(&self) -> &BTreeSet<u32> {
        &self.predicates
    }

    /// Label IDs observed on at least one event
    pub fn labels(&self) -> &BTreeSet<u32> {
        &self.labels
    }

    /// Sum of occurrence counts over all events
    pub fn total_occurrences(&self) -> u64 {
        self.events
            .iter()
            .map(|e| u64::from(e.occurrence_count()))
            .sum()
    }

    /// The GIS scaling constant C: the largest feature mass of any event,
    /// rounded up to a whole number.
    ///
    /// The feature mass of an event is the sum of its values, or the number of
    /// active predicates for a binary event. Fractional masses round up, so C
    /// is at least 1 as soon as one event carries any mass and it still bounds
    /// every event's mass. A store without mass has C = 0.
    pub fn scaling_constant(&self) -> f64 {
        self.events
            .iter()
            .map(Event::feature_mass)
            .fold(0.0, f64::max)
            .ceil()
    }
}
