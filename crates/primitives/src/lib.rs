//! Bounded, fail-fast browser action primitives.

mod errors;
mod primitives;
mod scripts;

pub use errors::ActionError;
pub use primitives::Primitives;
