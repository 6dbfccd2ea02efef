//! Error types for autocat

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Catalog load error: {0}")]
    CatalogLoad(String),

    #[error("Catalog not loaded: {0}")]
    CatalogNotLoaded(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("VIN decode error: {0}")]
    VinDecode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn catalog_load(msg: impl Into<String>) -> Self {
        Error::CatalogLoad(msg.into())
    }

    pub fn index(msg: impl Into<String>) -> Self {
        Error::Index(msg.into())
    }

    pub fn vin_decode(msg: impl Into<String>) -> Self {
        Error::VinDecode(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}
