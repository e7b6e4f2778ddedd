use std::{error::Error as StdError, fmt, sync::Arc};

use {async_trait::async_trait, einoah_common::Reply, tracing::warn};

use crate::Transport;

/// How an error reached the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Caught at the message-handling boundary.
    Handled,
    /// Escaped a background task.
    Uncaught,
    /// A rejected future nobody awaited.
    Unhandled,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// An error on its way to an operator.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub kind: ReportKind,
    pub name: String,
    pub detail: String,
    /// Channel of the message that failed, if any.
    pub origin_channel: Option<String>,
}

impl ErrorReport {
    pub fn new(kind: ReportKind, name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            detail: detail.into(),
            origin_channel: None,
        }
    }

    /// Build a report whose detail is the full source chain of `err`.
    pub fn from_error(kind: ReportKind, name: impl Into<String>, err: &dyn StdError) -> Self {
        let mut detail = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            detail.push_str("\ncaused by: ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::new(kind, name, detail)
    }

    #[must_use]
    pub fn with_origin(mut self, channel_id: impl Into<String>) -> Self {
        self.origin_channel = Some(channel_id.into());
        self
    }

    /// Markdown rendering posted to operator channels.
    pub fn render(&self) -> String {
        let header = match self.kind {
            ReportKind::Handled => String::new(),
            kind => format!("**{kind}**\n"),
        };
        format!("{header}**{}**\n```{}```", self.name, self.detail)
    }
}

/// Receives errors that must reach an operator.
#[async_trait]
pub trait ErrorSink: Send + Sync {
    async fn report(&self, report: ErrorReport);
}

/// Where a [`ChannelErrorSink`] posts reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportDestination {
    /// The channel the failing message came from.
    Origin,
    /// A fixed operator channel.
    Channel(String),
    /// Only log.
    LogOnly,
}

/// Posts error reports to a channel through a [`Transport`].
///
/// Every report is also logged. Delivery failures are logged and dropped.
pub struct ChannelErrorSink {
    transport: Arc<dyn Transport>,
    destination: ReportDestination,
}

impl ChannelErrorSink {
    pub fn new(transport: Arc<dyn Transport>, destination: ReportDestination) -> Self {
        Self {
            transport,
            destination,
        }
    }

    fn target<'a>(&'a self, report: &'a ErrorReport) -> Option<&'a str> {
        match &self.destination {
            ReportDestination::Origin => report.origin_channel.as_deref(),
            ReportDestination::Channel(id) => Some(id),
            ReportDestination::LogOnly => None,
        }
    }
}

#[async_trait]
impl ErrorSink for ChannelErrorSink {
    async fn report(&self, report: ErrorReport) {
        warn!(
            kind = %report.kind,
            name = %report.name,
            origin = ?report.origin_channel,
            "{}",
            report.detail
        );

        let Some(channel_id) = self.target(&report) else {
            return;
        };
        let body = Reply::Text(report.render());
        if let Err(e) = self.transport.send_reply(channel_id, &body).await {
            warn!(channel_id, error = %e, "error report could not be delivered");
        }
    }
}
