//! Element resolution for a shadow-DOM heavy web application.
//!
//! Fields are described semantically ([`SemanticTarget`]) rather than by
//! a single selector, and a chain of [`Strategy`] implementations is
//! tried in priority order until one produces a handle. Writes go
//! through [`dual_write_verified`], which fills both the component host
//! and its shadow input and refuses to report success until the value
//! reads back as written.

mod errors;
mod resolver;
mod scripts;
mod strategies;
mod types;

pub use errors::ResolverError;
pub use resolver::{dual_write_verified, Diagnostics, Resolver};
pub use strategies::{
    default_chain, ComponentLabelStrategy, FirstVisibleStrategy, KnownIdStrategy,
    LabelTextStrategy, PlaceholderStrategy, Strategy,
};
pub use types::{ControlKind, ElementHandle, Resolution, SemanticTarget};
