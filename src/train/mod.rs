//! Training module for maximum-entropy models
//!
//! This module contains the GIS training pipeline: the event store, the
//! expectation passes, the parameter update, the iteration controller and
//! model serialization.

mod builder;
mod dictionary;
mod event_store;
pub mod expectation;
mod model_writer;
mod params;
mod trainer;
pub mod updater;

// Re-export public types
pub use self::builder::{Corpus, EventStoreBuilder};
pub use self::dictionary::Dictionary;
pub use self::event_store::EventStore;
pub use self::model_writer::ModelWriter;
pub use self::params::GisParams;
pub use self::trainer::{EpochReport, Session, Trainer, TrainingOutcome, TrainingState};
pub use self::updater::{NewtonSolution, UpdateStats};
