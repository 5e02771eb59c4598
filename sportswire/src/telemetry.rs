use crate::config::MetricsConfig;
use aggregator::metrics_defs::ALL_METRICS;
use metrics_exporter_statsd::{StatsdBuilder, StatsdError};
use shared::metrics_defs::{MetricDef, MetricType};

const PREFIX: &str = "sportswire";

#[derive(thiserror::Error, Debug)]
pub enum MetricsError {
    #[error("could not build statsd recorder: {0}")]
    Statsd(#[from] StatsdError),
    #[error("a metrics recorder is already installed")]
    AlreadyInstalled,
}

/// Sends every metric to statsd under the `sportswire.` prefix.
pub fn init(config: &MetricsConfig) -> Result<(), MetricsError> {
    let recorder =
        StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port).build(Some(PREFIX))?;
    metrics::set_global_recorder(recorder).map_err(|_| MetricsError::AlreadyInstalled)?;

    for def in ALL_METRICS {
        describe(def);
    }
    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "statsd metrics enabled"
    );
    Ok(())
}

fn describe(def: &MetricDef) {
    match def.metric_type {
        MetricType::Counter => metrics::describe_counter!(def.name, def.description),
        MetricType::Gauge => metrics::describe_gauge!(def.name, def.description),
        MetricType::Histogram => metrics::describe_histogram!(def.name, def.description),
    }
}
