//! Metrics recorder initialization.

use {anyhow::Result, tracing::info};

/// Handle to the installed recorder.
#[derive(Clone)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl MetricsHandle {
    /// Render everything recorded so far in Prometheus text format.
    ///
    /// Empty when the `prometheus` feature is off.
    #[must_use]
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle.render()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    pub enabled: bool,
    /// Labels added to every metric
    pub global_labels: Vec<(String, String)>,
}

/// Install the global recorder. Call once at startup.
///
/// When disabled, or built without the `prometheus` feature, nothing is
/// installed and the facade stays a no-op.
///
/// # Errors
///
/// Fails if a recorder is already installed or the bucket layout is invalid.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    if !config.enabled {
        info!("metrics collection is disabled");
        return Ok(MetricsHandle {
            #[cfg(feature = "prometheus")]
            prometheus_handle: builder(&config)?.build_recorder().handle(),
        });
    }

    #[cfg(feature = "prometheus")]
    {
        let handle = builder(&config)?.install_recorder()?;
        info!("prometheus metrics recorder installed");
        Ok(MetricsHandle {
            prometheus_handle: handle,
        })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        info!("metrics feature not enabled at compile time");
        Ok(MetricsHandle {})
    }
}

#[cfg(feature = "prometheus")]
fn builder(config: &MetricsRecorderConfig) -> Result<metrics_exporter_prometheus::PrometheusBuilder> {
    use {
        crate::{buckets, messages},
        metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    };

    let mut builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(messages::PROCESSING_DURATION_SECONDS.to_string()),
        &buckets::PROCESSING_DURATION,
    )?;
    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }
    Ok(builder)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_recorder_renders_nothing_recorded() {
        let handle = init_metrics(MetricsRecorderConfig::default()).unwrap();
        let output = handle.render();
        assert!(!output.contains("einoah_"));
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn recorded_metrics_are_rendered() {
        use crate::{counter, histogram, messages};

        let config = MetricsRecorderConfig {
            enabled: true,
            global_labels: vec![("instance".into(), "test".into())],
        };
        let recorder = builder(&config).unwrap().build_recorder();
        let handle = MetricsHandle {
            prometheus_handle: recorder.handle(),
        };

        metrics::with_local_recorder(&recorder, || {
            counter!(messages::RECEIVED_TOTAL).increment(2);
            histogram!(messages::PROCESSING_DURATION_SECONDS).record(0.2);
        });

        let rendered = handle.render();
        let received = rendered
            .lines()
            .find(|line| line.starts_with(messages::RECEIVED_TOTAL))
            .unwrap();
        assert!(received.contains("instance=\"test\""));
        assert!(received.ends_with(" 2"));
        assert!(rendered.contains("einoah_processing_duration_seconds_bucket"));
    }
}
