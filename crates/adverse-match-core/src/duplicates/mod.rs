//! Duplicate adverse-event report detection.
//!
//! [`DuplicateScorer`] compares two reports on shared medicine, shared
//! patient, side-effect wording and incident-date proximity.
//! [`DuplicateDetector`] pulls a bounded, time-windowed candidate set from the
//! record store and keeps the candidates that score over the threshold.

mod control;
mod detector;
mod scorer;

pub use control::*;
pub use detector::*;
pub use scorer::*;
