use crate::SourceLocation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    /// The declaration tree could not be walked into a consistent entity tree.
    /// Fatal for the snapshot being extracted.
    #[error("Malformed surface at `{name}`{}: {reason}", location_suffix(.location))]
    MalformedSurface {
        name: String,
        location: Option<SourceLocation>,
        reason: String,
    },

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl CompatError {
    pub fn malformed(
        name: impl Into<String>,
        location: Option<SourceLocation>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedSurface {
            name: name.into(),
            location,
            reason: reason.into(),
        }
    }
}

fn location_suffix(location: &Option<SourceLocation>) -> String {
    match location {
        Some(loc) => format!(" ({})", loc),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, CompatError>;
