use crate::error::{GisError, Result};

/// One observed training instance: a label with the predicates active on it.
///
/// Events are validated once at construction and are immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Observed label ID
    label: u32,
    /// Active predicate IDs
    predicates: Vec<u32>,
    /// Values parallel to `predicates`; `None` means every predicate has value 1
    values: Option<Vec<f64>>,
    /// How many times this exact event was observed
    occurrence_count: u32,
}

impl Event {
    /// Create an event with explicit feature values.
    ///
    /// Fails with [`GisError::MalformedEvent`] when `values` is present and its
    /// length differs from `predicates`, when a value is negative or not finite,
    /// or when `occurrence_count` is zero.
    pub fn new(
        label: u32,
        predicates: Vec<u32>,
        values: Option<Vec<f64>>,
        occurrence_count: u32,
    ) -> Result<Self> {
        if occurrence_count == 0 {
            return Err(GisError::malformed("occurrence count must be positive"));
        }
        if let Some(values) = &values {
            if values.len() != predicates.len() {
                return Err(GisError::malformed(format!(
                    "{} predicates but {} values",
                    predicates.len(),
                    values.len()
                )));
            }
            if let Some(v) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(GisError::malformed(format!(
                    "feature value {} is not a finite non-negative number",
                    v
                )));
            }
        }
        Ok(Self {
            label,
            predicates,
            values,
            occurrence_count,
        })
    }

    /// Create a binary event: every active predicate has value 1.
    pub fn binary(label: u32, predicates: Vec<u32>, occurrence_count: u32) -> Result<Self> {
        Self::new(label, predicates, None, occurrence_count)
    }

    pub fn label(&self) -> u32 {
        self.label
    }

    pub fn predicates(&self) -> &[u32] {
        &self.predicates
    }

    pub fn values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }

    pub fn occurrence_count(&self) -> u32 {
        self.occurrence_count
    }

    /// Number of active predicates
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Value of the `index`-th active predicate.
    #[inline]
    pub fn value(&self, index: usize) -> f64 {
        match &self.values {
            Some(values) => values[index],
            None => 1.0,
        }
    }

    /// Iterate over `(predicate, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.predicates
            .iter()
            .enumerate()
            .map(move |(i, &p)| (p, self.value(i)))
    }

    /// Total feature mass of this event.
    pub fn feature_mass(&self) -> f64 {
        match &self.values {
            Some(values) => values.iter().sum(),
            None => self.predicates.len() as f64,
        }
    }

    pub(crate) fn add_occurrences(&mut self, count: u32) {
        self.occurrence_count = self.occurrence_count.saturating_add(count);
    }
}
