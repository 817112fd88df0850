pub mod cli;
pub mod config;
pub mod connection;
pub mod diff;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod observer;
pub mod pipeline;
pub mod remote;
pub mod scheduler;
pub mod util;

pub use error::ErrorClass;
pub use error::SyncError;
