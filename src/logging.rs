//! Log channel setup.
//!
//! Every [`LogChannel`] is a `tracing` target with its own JSON-lines file,
//! rotated daily and pruned to the channel's retention. Events without a
//! channel target land in the `app` file. A compact console layer is always
//! on, and spans are exported over OTLP when an endpoint is configured.

use std::fs;

use opentelemetry::{KeyValue, global, trace::TraceError};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    propagation::TraceContextPropagator,
    runtime,
    trace::{RandomIdGenerator, Sampler, Tracer},
};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use tracing::{Metadata, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter::filter_fn, fmt, layer::SubscriberExt,
    util::SubscriberInitExt,
};

use opsdesk_config::LoggingConfig;
use opsdesk_core::LogChannel;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the background log writers alive; drop it only at shutdown.
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
    otel_enabled: bool,
}

/// Whether events with `target` belong to `channel`. `app` takes everything
/// that is not explicitly routed to another channel.
fn on_channel(channel: LogChannel, target: &str) -> bool {
    match channel {
        LogChannel::App => !LogChannel::ALL
            .iter()
            .any(|c| *c != LogChannel::App && c.target() == target),
        _ => target == channel.target(),
    }
}

fn channel_layer(
    channel: LogChannel,
    config: &LoggingConfig,
) -> anyhow::Result<(BoxedLayer, WorkerGuard)> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(channel.target())
        .filename_suffix("log")
        .max_log_files(channel.retention_days())
        .build(&config.log_dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .json()
        .with_writer(writer)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_current_span(true)
        .with_filter(filter_fn(move |metadata: &Metadata<'_>| {
            on_channel(channel, metadata.target())
        }))
        .with_filter(EnvFilter::new(&config.level))
        .boxed();

    Ok((layer, guard))
}

fn init_tracer(otlp_endpoint: String) -> Result<Tracer, TraceError> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let resource = Resource::new(vec![
        KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
        KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
        KeyValue::new(
            "environment",
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        ),
    ]);

    let otlp_exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(otlp_endpoint);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(otlp_exporter)
        .with_trace_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(resource),
        )
        .install_batch(runtime::Tokio)
}

/// Installs the global subscriber.
///
/// OTLP export is attempted only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set; if
/// the exporter cannot be built the service keeps running with file and
/// console logging.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<LogGuards> {
    fs::create_dir_all(&config.log_dir)?;

    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},tower_http=warn,hyper=info,tonic=info,sqlx=warn",
            config.level
        ))
    });

    let mut layers: Vec<BoxedLayer> = vec![
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .compact()
            .with_filter(console_filter)
            .boxed(),
    ];

    let mut guards = Vec::with_capacity(LogChannel::ALL.len());
    for channel in LogChannel::ALL {
        let (layer, guard) = channel_layer(channel, config)?;
        layers.push(layer);
        guards.push(guard);
    }

    let tracer = match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) => match init_tracer(endpoint) {
            Ok(tracer) => Some(tracer),
            Err(e) => {
                eprintln!("Failed to initialize OpenTelemetry: {}. Continuing without it.", e);
                None
            }
        },
        Err(_) => None,
    };
    let otel_enabled = tracer.is_some();
    if let Some(tracer) = tracer {
        layers.push(
            tracing_opentelemetry::layer()
                .with_tracer(tracer)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    if otel_enabled {
        info!(target: "app", log_dir = %config.log_dir.display(), "Tracing initialized with OpenTelemetry and channel logs");
    } else {
        info!(target: "app", log_dir = %config.log_dir.display(), "Tracing initialized without OpenTelemetry");
    }

    Ok(LogGuards {
        _guards: guards,
        otel_enabled,
    })
}

pub async fn shutdown_tracer(guards: LogGuards) {
    if guards.otel_enabled {
        info!(target: "app", "Shutting down OpenTelemetry tracer...");
        global::shutdown_tracer_provider();
    }
    drop(guards);
}
