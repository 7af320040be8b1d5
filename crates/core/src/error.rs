use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModloadError {
    #[error("name not registered: {0}")]
    NotFound(String),
    #[error("invalid state for '{name}': {reason}")]
    InvalidState { name: String, reason: String },
    #[error("materialization of '{name}' failed: {message}")]
    Materialization { name: String, message: String },
    #[error("empty path segment")]
    EmptySegment,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid ignore pattern: {0}")]
    Pattern(#[from] globset::Error),
    #[error("watch error: {0}")]
    Watch(String),
}

impl ModloadError {
    /// Wrap a boundary failure raised while executing `name`'s backing
    /// resource.
    pub fn materialization(name: impl Into<String>, source: &modload_api::BoxError) -> Self {
        ModloadError::Materialization {
            name: name.into(),
            message: source.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModloadError>;
