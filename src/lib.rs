pub mod auth;
pub mod chunker;
pub mod embeddings;
pub mod handlers;
pub mod indexing;
pub mod llm;
pub mod pdf;
pub mod retrieval;
pub mod snapshot;
pub mod store;
pub mod vectordb;

pub mod error;
pub mod types;
pub mod config;

pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
