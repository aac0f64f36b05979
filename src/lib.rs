use thiserror::Error;

pub type Result<T> = std::result::Result<T, LensError>;

#[derive(Error, Debug)]
pub enum LensError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod classify;
pub mod commands;
pub mod config;
pub mod control;
pub mod embeddings;
pub mod feeds;
pub mod pipeline;
pub mod recommend;
pub mod scheduler;
pub mod store;
