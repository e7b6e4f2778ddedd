use std::{error::Error as StdError, time::Duration};

use einoah_routing::Audience;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Command(#[from] einoah_routing::Error),

    /// The per-message budget elapsed before handling finished.
    #[error("message handling took longer than {}s", .after.as_secs_f64())]
    Timeout { after: Duration },

    #[error("failed to flush session")]
    Flush {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("route init hook failed")]
    Init {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    pub fn audience(&self) -> Audience {
        match self {
            Self::Command(err) => err.audience(),
            Self::Timeout { .. } | Self::Flush { .. } | Self::Init { .. } => Audience::Operator,
        }
    }

    /// Stable name used in error reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Command(err) => err.name(),
            Self::Timeout { .. } => "Timeout",
            Self::Flush { .. } => "PersistenceError",
            Self::Init { .. } => "InitError",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
