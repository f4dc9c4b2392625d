//! Error types for Fieldbook Core

use thiserror::Error;

use crate::validate::DefinitionErrors;

/// Result type alias using Fieldbook's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while authoring or loading a project
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid project name: {0}")]
    InvalidProjectName(String),

    #[error("Invalid project definition: {0}")]
    Definition(#[from] DefinitionErrors),

    #[error("Malformed definition document: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// The coded validation errors, when the definition itself was rejected
    pub fn definition_errors(&self) -> Option<&DefinitionErrors> {
        match self {
            Self::Definition(errors) => Some(errors),
            _ => None,
        }
    }
}
