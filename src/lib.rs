pub mod config;
pub mod embedding;
pub mod enrichment;
pub mod errors;
pub mod generation;
pub mod ingest;
pub mod logging;
pub mod search;
pub mod server;
pub mod store;
