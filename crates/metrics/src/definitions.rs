//! Metric name and label definitions.

/// Inbound message handling
pub mod messages {
    /// Total number of addressed messages received
    pub const RECEIVED_TOTAL: &str = "einoah_messages_received_total";
    /// Messages that failed, labelled by audience (user / operator)
    pub const ERRORS_TOTAL: &str = "einoah_message_errors_total";
    /// Messages abandoned because the per-message budget elapsed
    pub const TIMEOUTS_TOTAL: &str = "einoah_message_timeouts_total";
    /// End-to-end processing duration in seconds
    pub const PROCESSING_DURATION_SECONDS: &str = "einoah_processing_duration_seconds";
}

/// Mention resolution
pub mod mentions {
    /// Platform lookups issued, labelled by mention kind
    pub const LOOKUPS_TOTAL: &str = "einoah_mention_lookups_total";
    /// Lookups that failed, labelled by mention kind
    pub const LOOKUP_FAILURES_TOTAL: &str = "einoah_mention_lookup_failures_total";
}

/// Route dispatch
pub mod dispatch {
    /// Dispatches, labelled by outcome (handled / no_match / failed)
    pub const TOTAL: &str = "einoah_dispatch_total";
}

/// Common label keys
pub mod labels {
    pub const KIND: &str = "kind";
    pub const OUTCOME: &str = "outcome";
    pub const AUDIENCE: &str = "audience";
}

/// Histogram buckets
pub mod buckets {
    /// Message processing duration in seconds; 5ms up to the slowest handlers
    pub const PROCESSING_DURATION: [f64; 11] =
        [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0];
}
