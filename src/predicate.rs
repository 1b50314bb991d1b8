/// A named context feature as it comes out of feature extraction.
///
/// Binary predicates carry the value 1. [`EventStoreBuilder`] interns the
/// name and keeps the value only when some predicate of the instance is not
/// binary.
///
/// [`EventStoreBuilder`]: crate::train::EventStoreBuilder
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub name: String,
    /// Non-negative feature value
    pub value: f64,
}

impl Predicate {
    pub fn new<T: Into<String>>(name: T, value: f64) -> Self {
        Predicate {
            name: name.into(),
            value,
        }
    }

    /// A predicate that is simply active
    pub fn binary<T: Into<String>>(name: T) -> Self {
        Predicate::new(name, 1.0)
    }

    pub fn is_binary(&self) -> bool {
        self.value == 1.0
    }
}

impl From<String> for Predicate {
    fn from(name: String) -> Self {
        Predicate::binary(name)
    }
}

impl From<&str> for Predicate {
    fn from(name: &str) -> Self {
        Predicate::binary(name)
    }
}

impl<S: Into<String>> From<(S, f64)> for Predicate {
    fn from((name, value): (S, f64)) -> Self {
        Predicate::new(name, value)
    }
}
