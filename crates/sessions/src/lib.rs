//! Persistence collaborator boundary.
//!
//! One [`Session`] is forked from the [`Persistence`] root per incoming
//! message, used by that message's handlers only, and flushed when handling
//! ends. Lookups create the record on a miss.

pub mod error;
pub mod memory;
pub mod records;
pub mod store;

pub use {
    error::{Error, Result},
    memory::{MemorySession, MemoryStore},
    records::{CategoryRecord, GuildIdentityRecord, IdentityRecord},
    store::{Persistence, Session},
};
