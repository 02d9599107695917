// Centralized logging setup: leveled console output with UTC timestamps, optional JSON log file
use std::env;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;
use eyre::{Result, eyre};
use tracing::{Id, Subscriber, debug, field::Field, field::Visit, span};
use tracing_subscriber::{
    EnvFilter,
    fmt,
    layer::{Context, Layer, SubscriberExt},
    util::SubscriberInitExt,
};

static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const CRATE_TARGET: &str = "fund_nav_pipeline";

pub fn init_logging(bin_name: String) -> Result<()> {
    let console_log_level = env::var("CONSOLE_LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
    let file_log_level = env::var("FILE_LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
    let log_to_file = env::var("LOG_TO_FILE").unwrap_or_else(|_| "false".to_string()) == "true";

    // Dependencies only surface warnings; the library and the running binary log at the configured level
    let bin_target = bin_name.replace('-', "_");
    let console_filter = crate_filter(&console_log_level, &bin_target);
    let file_filter = crate_filter(&file_log_level, &bin_target);

    let console_layer = fmt::Layer::new()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(false)
        .with_filter(console_filter);

    let registry = tracing_subscriber::registry()
        .with(console_layer)
        .with(RunTimingLayer);

    if log_to_file {
        let log_dir = Path::new("logs");
        fs::create_dir_all(log_dir)?;
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S");
        let file_name = format!("{bin_name}_{timestamp}.log");

        let file_appender = tracing_appender::rolling::never(log_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        FILE_GUARD.set(guard).map_err(|_| eyre!("Logging already initialized"))?;

        let file_layer = fmt::Layer::new()
            .json()
            .with_writer(non_blocking)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_filter(file_filter);

        registry.with(file_layer).try_init()?;
    } else {
        registry.try_init()?;
    }

    debug!(bin = %bin_name, log_to_file, "Logging initialized");
    Ok(())
}

/// `bin_target` is the binary's crate name, the target of events logged in `src/bin`.
fn crate_filter(level: &str, bin_target: &str) -> EnvFilter {
    EnvFilter::try_new(format!("warn,{CRATE_TARGET}={level},{bin_target}={level}"))
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,{CRATE_TARGET}=info,{bin_target}=info")))
}

// Reports wall time of spans opened with `on_close = true`
struct RunTimingLayer;

struct SpanStart(Instant);

struct OnCloseVisitor {
    on_close: bool,
}

impl Visit for OnCloseVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "on_close" {
            self.on_close = value;
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
}

impl<S> Layer<S> for RunTimingLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = OnCloseVisitor { on_close: false };
        attrs.record(&mut visitor);
        if !visitor.on_close {
            return;
        }
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanStart(Instant::now()));
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(&id) {
            if let Some(SpanStart(start)) = span.extensions_mut().remove::<SpanStart>() {
                debug!(span = span.name(), elapsed = ?start.elapsed(), "span closed");
            }
        }
    }
}
