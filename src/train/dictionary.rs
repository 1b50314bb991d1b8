use std::collections::HashMap;

use crate::error::{GisError, Result};

/// Interns predicate or label names as dense IDs.
///
/// IDs are handed out in first-seen order starting at 0, so after a corpus
/// load `len()` is the size of the ID universe. Each builder owns its own
/// dictionaries; nothing is shared between loads.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    ids: HashMap<String, u32>,
    /// Indexed by ID
    names: Vec<String>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// ID of `name`, assigning the next free one on first sight.
    ///
    /// Fails once the universe would outgrow `u32` IDs.
    pub fn intern(&mut self, name: &str) -> Result<u32> {
        if let Some(&id) = self.ids.get(name) {
            return Ok(id);
        }
        let id = u32::try_from(self.names.len())
            .map_err(|_| GisError::config("more than u32::MAX distinct names"))?;
        self.ids.insert(name.to_owned(), id);
        self.names.push(name.to_owned());
        Ok(id)
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.names.clear();
    }

    /// `(name, id)` pairs in ID order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.names.iter().zip(0..).map(|(name, id)| (name.as_str(), id))
    }
}
