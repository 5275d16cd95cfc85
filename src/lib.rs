pub mod cli;
pub mod error;
pub mod file;
pub mod ingest;
pub mod instrument;
pub mod location;
pub mod map;
pub mod path;
pub mod remap;
pub mod report;
pub mod summary;
pub mod tree;
