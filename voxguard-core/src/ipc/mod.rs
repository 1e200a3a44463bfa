//! Serialisable types handed to presentation hosts.

pub mod events;

pub use events::{AnalysisOutcome, ClassificationReport, ErrorKind};
