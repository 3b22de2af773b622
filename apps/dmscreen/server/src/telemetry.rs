use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use opentelemetry::trace::TracerProvider;
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::resource::Resource;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_stdout::SpanExporter;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ServerConfig;

const SERVICE_NAME: &str = "dmscreen-server";

/// Snapshots are small JSON documents; a full initiative list rarely passes a
/// few kilobytes.
const MESSAGE_SIZE_BUCKETS: &[f64] = &[
    16.0, 64.0, 256.0, 1024.0, 4096.0, 16384.0, 65536.0,
];

/// Process-wide log, trace and metrics plumbing for the relay. Keep it alive
/// for the life of the process; dropping it flushes the span exporter.
pub struct Telemetry {
    metrics_handle: PrometheusHandle,
    tracer_provider: Option<SdkTracerProvider>,
}

impl Telemetry {
    pub fn init(config: &ServerConfig) -> Result<Self> {
        let metrics_handle = metrics_builder()?
            .install_recorder()
            .context("failed to install Prometheus metrics recorder")?;
        describe_relay_metrics();

        let tracer_provider = config.otel_stdout.then(stdout_tracer_provider);
        let otel_layer = tracer_provider.as_ref().map(|provider| {
            global::set_tracer_provider(provider.clone());
            tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME))
        });

        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .with(otel_layer)
            .try_init()
            .context("failed to initialise tracing subscriber")?;

        if tracer_provider.is_some() {
            info!("OpenTelemetry stdout span export enabled");
        }

        Ok(Self {
            metrics_handle,
            tracer_provider,
        })
    }

    pub fn metrics_handle(&self) -> PrometheusHandle {
        self.metrics_handle.clone()
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Some(provider) = &self.tracer_provider {
            if let Err(err) = provider.shutdown() {
                warn!(error = %err, "failed to shutdown OpenTelemetry tracer provider");
            }
        }
    }
}

/// Prometheus exporter with histogram buckets sized for relay frames.
pub fn metrics_builder() -> Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("dmscreen_message_size_bytes".to_string()),
            MESSAGE_SIZE_BUCKETS,
        )
        .context("invalid message size buckets")
}

fn describe_relay_metrics() {
    describe_counter!(
        "dmscreen_connections_total",
        "Relay connections accepted since start"
    );
    describe_counter!(
        "dmscreen_connections_closed_total",
        "Relay connections that have ended"
    );
    describe_gauge!(
        "dmscreen_connections_active",
        "Relay connections currently open"
    );
    describe_counter!(
        "dmscreen_messages_forwarded_total",
        "Frames handed to peer queues"
    );
    describe_counter!(
        "dmscreen_bytes_forwarded_total",
        Unit::Bytes,
        "Payload bytes handed to peer queues"
    );
    describe_counter!(
        "dmscreen_flow_control_drops_total",
        "Stale frames shed from a slow peer's queue"
    );
    describe_histogram!(
        "dmscreen_message_size_bytes",
        Unit::Bytes,
        "Payload size of relayed frames"
    );
}

fn stdout_tracer_provider() -> SdkTracerProvider {
    SdkTracerProvider::builder()
        .with_simple_exporter(SpanExporter::default())
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(
            Resource::builder()
                .with_attributes(vec![KeyValue::new("service.name", SERVICE_NAME)])
                .build(),
        )
        .build()
}
