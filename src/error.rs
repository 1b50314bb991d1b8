use std::io;

use thiserror::Error;

/// Errors raised while building a corpus, training, or loading a model.
#[derive(Debug, Error)]
pub enum GisError {
    /// An event failed validation at construction time.
    #[error("malformed event: {reason}")]
    MalformedEvent {
        /// What was wrong with the event.
        reason: String,
    },

    /// Invalid training configuration or an unusable training set.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A predicate or label ID outside the declared universe.
    #[error("{kind} id {id} is out of range (universe size {bound})")]
    UnknownId {
        /// Either `"predicate"` or `"label"`.
        kind: &'static str,
        /// The offending ID.
        id: u32,
        /// Size of the declared universe.
        bound: usize,
    },

    /// A NaN or infinite value appeared during training.
    #[error("numerical divergence at epoch {epoch}: {quantity}")]
    NumericalDivergence {
        /// 1-based epoch in which the value was detected.
        epoch: usize,
        /// Which quantity went non-finite.
        quantity: String,
    },

    /// A serialized model could not be decoded.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl GisError {
    pub(crate) fn malformed<S: Into<String>>(reason: S) -> Self {
        GisError::MalformedEvent {
            reason: reason.into(),
        }
    }

    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        GisError::Configuration(msg.into())
    }
}

/// Result type alias for training and model operations.
pub type Result<T> = std::result::Result<T, GisError>;
