use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Missing template asset {path}: {source}")]
    MissingAsset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template is malformed: {0}")]
    Template(String),

    #[error("Failed to bind template fields: {0}")]
    Binding(String),

    #[error("Rasterization failed: {0}")]
    Rasterize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
