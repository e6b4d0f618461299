//! Result harvesting from the virtualized declarations grid.

mod errors;
mod extractor;
pub mod geometry;

pub use errors::GridError;
pub use extractor::GridExtractor;
