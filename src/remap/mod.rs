//! Source-map remapping of coverage from generated files back to the
//! sources they were compiled from.

pub mod consumer;
pub mod mapped;
pub mod mapping;
pub mod store;
pub mod transformer;

pub use consumer::{Bias, SourceMapConsumer, SourceMapIndex};
pub use mapped::MappedCoverage;
pub use mapping::{get_mapping, MappedLocation};
pub use store::MapStore;
pub use transformer::transform;
