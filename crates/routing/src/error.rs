use std::{error::Error as StdError, sync::Arc};

use crate::{context::IdentityView, mention::TypeTag, table::RouteKey};

/// Who needs to hear about a failed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Bad input; tell the user who sent it.
    User,
    /// A defect or outage; escalate to an operator.
    Operator,
}

impl Audience {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Operator => "operator",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("message has no content")]
    EmptyMessage,

    /// A mention marker's id does not exist on the platform.
    #[error("invalid mention of {kind} {id}")]
    InvalidMention { kind: TypeTag, id: String },

    /// A mention lookup failed for any reason other than not-found.
    #[error("could not resolve {kind} {id}")]
    UnknownResolution {
        kind: TypeTag,
        id: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// Handler code asked for both identity views in one invocation.
    #[error("{requested} identity requested after the {committed} identity was used")]
    MixedIdentityAccess {
        committed: IdentityView,
        requested: IdentityView,
    },

    #[error("route key {key} is already registered")]
    DuplicateRouteKey { key: RouteKey },

    /// A session lookup failed. The source is shared so a cached failure can
    /// be handed to every accessor.
    #[error("{context}")]
    Persistence {
        context: String,
        #[source]
        source: Arc<dyn StdError + Send + Sync>,
    },

    /// Failure returned by a route handler, passed through untouched.
    #[error(transparent)]
    Handler(anyhow::Error),
}

impl Error {
    #[must_use]
    pub fn persistence(context: impl Into<String>, source: anyhow::Error) -> Self {
        let source: Box<dyn StdError + Send + Sync> = source.into();
        Self::Persistence {
            context: context.into(),
            source: source.into(),
        }
    }

    /// The error inside a handler failure, if the handler propagated one of ours.
    pub fn inner(&self) -> &Self {
        match self {
            Self::Handler(err) => err.downcast_ref::<Self>().unwrap_or(self),
            other => other,
        }
    }

    /// Tokenize and resolve failures are the sender's problem; everything
    /// else goes to an operator.
    pub fn audience(&self) -> Audience {
        match self {
            Self::EmptyMessage | Self::InvalidMention { .. } | Self::UnknownResolution { .. } => {
                Audience::User
            },
            Self::MixedIdentityAccess { .. }
            | Self::DuplicateRouteKey { .. }
            | Self::Persistence { .. }
            | Self::Handler(_) => Audience::Operator,
        }
    }

    /// Stable name used in error reports.
    pub fn name(&self) -> &'static str {
        match self.inner() {
            Self::EmptyMessage => "EmptyMessage",
            Self::InvalidMention { .. } => "InvalidMention",
            Self::UnknownResolution { .. } => "UnknownResolutionError",
            Self::MixedIdentityAccess { .. } => "MixedIdentityAccess",
            Self::DuplicateRouteKey { .. } => "DuplicateRouteKey",
            Self::Persistence { .. } => "PersistenceError",
            Self::Handler(_) => "HandlerError",
        }
    }

    /// Whether this is a defect in handler code rather than a runtime failure.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self.inner(),
            Self::MixedIdentityAccess { .. } | Self::DuplicateRouteKey { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
