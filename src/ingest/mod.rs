pub mod boundary;
pub mod engine;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{ResumptionEngine, Termination};
pub use writer::{InsertOutcome, TaxonomyWriter};
