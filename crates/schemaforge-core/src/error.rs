use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid schema document: {0}")]
    Shape(#[from] crate::schema::ShapeError),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::job::TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Import failed: {0}")]
    Import(#[from] crate::pipeline::ImportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
