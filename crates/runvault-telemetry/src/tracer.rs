//! Tracer setup and management

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{SimpleSpanProcessor, TracerProvider};
use runvault_core::{LogFormat, ObservabilityConfig};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Global tracer provider holder
static TRACER_PROVIDER: OnceLock<Arc<TracerProvider>> = OnceLock::new();

/// Span processor builders registered before initialization
type ProcessorBuilder = Box<dyn FnOnce() -> SimpleSpanProcessor + Send>;
static SPAN_PROCESSOR_BUILDERS: Mutex<Option<Vec<ProcessorBuilder>>> = Mutex::new(Some(Vec::new()));

/// Register a span processor to attach when telemetry is initialized.
///
/// Use this to plug in an exporter (OTLP, Jaeger, an in-process collector
/// in tests). Must be called before [`init_telemetry`]; later registrations
/// are dropped with a warning.
///
/// # Example
///
/// ```ignore
/// use runvault_telemetry::{init_telemetry, register_span_processor};
/// use opentelemetry_sdk::trace::SimpleSpanProcessor;
///
/// register_span_processor(Box::new(|| {
///     SimpleSpanProcessor::new(Box::new(/* your exporter */))
/// }));
/// init_telemetry(&config.observability)?;
/// ```
pub fn register_span_processor(builder: ProcessorBuilder) {
    let mut builders = SPAN_PROCESSOR_BUILDERS
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(ref mut vec) = *builders {
        vec.push(builder);
    } else {
        tracing::warn!("Attempted to register span processor after telemetry initialization");
    }
}

/// Initialize logging and tracing for the process.
///
/// Installs a global subscriber made of:
/// - an OpenTelemetry layer fed by the registered span processors
/// - a `fmt` layer, human readable or JSON per `config.log_format`
/// - an `EnvFilter` from `RUST_LOG`, falling back to `config.log_filter`
///
/// Fails if a global subscriber is already installed.
///
/// # Example
///
/// ```rust,no_run
/// use runvault_core::ObservabilityConfig;
/// use runvault_telemetry::init_telemetry;
///
/// init_telemetry(&ObservabilityConfig::default()).unwrap();
/// ```
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let builders = SPAN_PROCESSOR_BUILDERS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
        .unwrap_or_default();

    let mut provider_builder = TracerProvider::builder();
    for builder in builders {
        provider_builder = provider_builder.with_span_processor(builder());
    }
    let tracer_provider = provider_builder.build();

    let tracer_name = config
        .service_name
        .clone()
        .unwrap_or_else(|| crate::attributes::SYSTEM_NAME.to_string());
    let tracer = tracer_provider.tracer(tracer_name);

    let _ = TRACER_PROVIDER.set(Arc::new(tracer_provider));

    let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Exactly one of these is set
    let (pretty_layer, json_layer) = match config.log_format {
        LogFormat::Pretty => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(false)
                    .with_line_number(true),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(pretty_layer)
        .with(json_layer)
        .with(filter)
        .try_init()
}

/// Get the global tracer provider if initialized
pub fn tracer_provider() -> Option<Arc<TracerProvider>> {
    TRACER_PROVIDER.get().cloned()
}
