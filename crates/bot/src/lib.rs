//! Message-handling boundary: the glue between a chat transport and the
//! routing core.
//!
//! Flow: addressed message → send-permission gate → typing indicator →
//! fork session → parse + dispatch (optionally under a time budget) →
//! flush session → deliver reply or surface the error.

pub mod bot;
pub mod error;

pub use {
    bot::{Bot, MessageOutcome, address_matcher},
    error::{Error, Result},
};
