pub mod blob;
pub mod cli;
pub mod config;
pub mod db;
pub mod embed;
pub mod ingest;
mod metrics;
pub mod resize;
pub mod searcher;
mod server;
pub mod store;
pub mod utils;
pub mod vector;

pub use config::Opts;
pub use ingest::{IngestOptions, Ingestor};
pub use searcher::{MatchResult, Searcher};
pub use vector::EmbeddingVector;
