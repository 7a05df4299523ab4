//! Domain models for adverse-event matching.

mod medicine;
mod report;
mod scoring;

pub use medicine::*;
pub use report::*;
pub use scoring::*;
