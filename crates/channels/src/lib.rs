//! Chat-platform collaborator boundary.
//!
//! The command core never talks to a chat platform directly. It consumes the
//! [`Platform`] trait to look entities up by id, the [`Transport`] trait to
//! send replies, and reports failures to an [`ErrorSink`].

pub mod error;
pub mod memory;
pub mod platform;
pub mod report;

pub use {
    error::{Error, LookupError, Result},
    memory::{MemoryPlatform, SentMessage},
    platform::{Platform, Transport},
    report::{ChannelErrorSink, ErrorReport, ErrorSink, ReportDestination, ReportKind},
};
