//! Metric names and the recorder for einoah.
//!
//! Crates record through the `metrics` facade behind their own `metrics`
//! feature. Nothing is kept unless the binary calls [`init_metrics`] with the
//! `prometheus` feature on; [`MetricsHandle::render`] then returns a snapshot.
//!
//! ```rust,ignore
//! use einoah_metrics::{counter, dispatch, labels};
//!
//! counter!(dispatch::TOTAL, labels::OUTCOME => "handled").increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, histogram};
