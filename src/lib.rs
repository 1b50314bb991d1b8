//! Maximum-entropy model training with Generalized Iterative Scaling (GIS)
//!
//! The trained model is the scoring backend of a CRF-style sequence tagger:
//! it assigns each label a conditional probability given the predicates
//! active at a position.
//!
//! # Examples
//!
//! ## Training
//!
//! ```no_run
//! use maxent_gis::train::{EventStoreBuilder, ModelWriter, Trainer};
//! use maxent_gis::Predicate;
//!
//! let mut builder = EventStoreBuilder::new();
//! builder.append(vec![Predicate::from("w=walk"), Predicate::new("len", 0.5)], "sunny")?;
//! builder.append(vec![Predicate::from("w=clean")], "rainy")?;
//! let corpus = builder.build()?;
//!
//! let trainer = Trainer::new().with_max_iterations(50)?;
//! let outcome = trainer.train(&corpus.store)?;
//! ModelWriter::write(std::path::Path::new("model.gis"), &outcome.model)?;
//! # Ok::<(), maxent_gis::GisError>(())
//! ```
//!
//! ## Prediction
//!
//! ```no_run
//! use maxent_gis::{Event, GisModel};
//!
//! let model_data = std::fs::read("model.gis")?;
//! let model = GisModel::from_bytes(&model_data)?;
//! let event = Event::binary(0, vec![0, 1], 1)?;
//! let probs = model.probabilities(&event)?;
//! let best = model.classify(&event)?;
//! # Ok::<(), maxent_gis::GisError>(())
//! ```

mod cancel;
mod error;
mod event;
mod model;
mod predicate;
pub mod probability;

/// Training module containing all components for training GIS models
pub mod train;

// Re-export main types
pub use self::cancel::CancellationToken;
pub use self::error::{GisError, Result};
pub use self::event::Event;
pub use self::model::GisModel;
pub use self::predicate::Predicate;

// Re-export training types for convenience
pub use self::train::{GisParams, Trainer};
