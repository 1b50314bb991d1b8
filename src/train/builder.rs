use std::collections::HashMap;

use super::dictionary::Dictionary;
use super::event_store::EventStore;
use crate::error::Result;
use crate::event::Event;
use crate::predicate::Predicate;

/// Identity of an event for deduplication; values are compared bitwise.
#[derive(Debug, PartialEq, Eq, Hash)]
struct EventKey {
    label: u32,
    predicates: Vec<u32>,
    values: Option<Vec<u64>>,
}

impl EventKey {
    fn of(event: &Event) -> Self {
        Self {
            label: event.label(),
            predicates: event.predicates().to_vec(),
            values: event
                .values()
                .map(|values| values.iter().map(|v| v.to_bits()).collect()),
        }
    }
}

/// A training corpus built from named predicates and labels
#[derive(Debug, Clone)]
pub struct Corpus {
    /// Events with dense IDs
    pub store: EventStore,
    /// Predicate name dictionary
    pub predicates: Dictionary,
    /// Label name dictionary
    pub labels: Dictionary,
}

/// Builds an [`EventStore`] from string-level training instances
///
/// Names are mapped to IDs through dictionaries owned by the builder, and
/// identical events are merged into a single event whose occurrence count is
/// the number of times it was appended.
#[derive(Debug, Default)]
pub struct EventStoreBuilder {
    /// Predicate dictionary
    predicates: Dictionary,
    /// Label dictionary
    labels: Dictionary,
    /// Distinct events in insertion order
    events: Vec<Event>,
    /// Position of each distinct event in `events`
    index: HashMap<EventKey, usize>,
}

impl EventStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one training instance
    pub fn append<P: AsRef<[Predicate]>>(&mut self, predicates: P, label: &str) -> Result<()> {
        self.append_with_count(predicates, label, 1)
    }

    /// Append a training instance observed `count` times
    pub fn append_with_count<P: AsRef<[Predicate]>>(
        &mut self,
        predicates: P,
        label: &str,
        count: u32,
    ) -> Result<()> {
        let predicates = predicates.as_ref();
        let mut ids = Vec::with_capacity(predicates.len());
        for p in predicates {
            ids.push(self.predicates.intern(&p.name)?);
        }
        let lid = self.labels.intern(label)?;

        // All-binary contexts are stored without values
        let values = if predicates.iter().all(Predicate::is_binary) {
            None
        } else {
            Some(predicates.iter().map(|p| p.value).collect())
        };
        let event = Event::new(lid, ids, values, count)?;

        let key = EventKey::of(&event);
        match self.index.get(&key) {
            Some(&pos) => self.events[pos].add_occurrences(count),
            None => {
                self.index.insert(key, self.events.len());
                self.events.push(event);
            }
        }
        Ok(())
    }

    /// Number of distinct events appended so far
    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    pub fn predicates(&self) -> &Dictionary {
        &self.predicates
    }

    pub fn labels(&self) -> &Dictionary {
        &self.labels
    }

    /// Clear all training data
    pub fn clear(&mut self) {
        self.predicates.clear();
        self.labels.clear();
        self.events.clear();
        self.index.clear();
    }

    /// Finish the corpus.
    ///
    /// The predicate and label universes are exactly the dictionary sizes.
    pub fn build(self) -> Result<Corpus> {
        let store = EventStore::new(self.events, self.predicates.len(), self.labels.len())?;
        Ok(Corpus {
            store,
            predicates: self.predicates,
            labels: self.labels,
        })
    }
}
