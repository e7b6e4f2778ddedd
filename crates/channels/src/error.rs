use std::error::Error as StdError;

/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed channel errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input payload or parameter is invalid.
    #[error("invalid channel input: {message}")]
    InvalidInput { message: String },

    /// The destination channel or user does not exist.
    #[error("unknown destination: {id}")]
    UnknownDestination { id: String },

    /// The bot lacks permission to write to the destination.
    #[error("not allowed to send to {id}")]
    Forbidden { id: String },

    /// Wrapped source error from the transport.
    #[error("channel operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_destination(id: impl std::fmt::Display) -> Self {
        Self::UnknownDestination { id: id.to_string() }
    }

    #[must_use]
    pub fn forbidden(id: impl std::fmt::Display) -> Self {
        Self::Forbidden { id: id.to_string() }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Failure of a fetch-by-id lookup against the platform.
///
/// `NotFound` is kept apart from transport failures so callers can tell a
/// bad id from a broken connection.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("entity not found")]
    NotFound,

    #[error("platform request failed: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),
}

impl LookupError {
    #[must_use]
    pub fn transport(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(source))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
