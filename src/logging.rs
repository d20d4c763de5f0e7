//! Logging utilities for droughtmap.
//!
//! Structured `tracing` helpers shared by the CLI and the server: subscriber
//! setup, HTTP request tracing, operation timing and error reporting.

use std::time::Instant;
use tracing::{debug, error, info, warn, Level};

use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use uuid::Uuid;

use crate::error::{DroughtMapError, Result};
use crate::raster::RasterGrid;

/// Creates the tracing layer for HTTP request/response logging
pub fn create_http_trace_layer() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    DefaultMakeSpan,
    DefaultOnRequest,
    DefaultOnResponse,
> {
    // Create a custom response formatter that includes timing
    let response_formatter = DefaultOnResponse::new()
        .level(Level::DEBUG)
        .latency_unit(LatencyUnit::Micros);

    // Configure the tracing layer
    TraceLayer::new_for_http()
        .make_span_with(
            DefaultMakeSpan::new()
                .level(Level::INFO)
                .include_headers(true),
        )
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(response_formatter)
}

/// Initialize the tracing subscriber with the given log level
pub fn init_tracing(log_level: &str) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(val) => val,
        Err(_) => log_level.to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Log a start message for a significant operation
pub fn log_operation_start(operation: &str, details: Option<&str>) {
    if let Some(details) = details {
        info!(
            operation = operation,
            details = details,
            "Starting operation"
        );
    } else {
        info!(operation = operation, "Starting operation");
    }
}

/// Log the completion of a significant operation.
///
/// Operations that finished but raised data-quality warnings are logged at
/// warn level so they stand out from clean runs.
pub fn log_operation_end(operation: &str, start_time: Instant, warnings: usize) {
    let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;

    if warnings == 0 {
        info!(
            operation = operation,
            duration_ms = duration_ms,
            "Operation completed successfully"
        );
    } else {
        warn!(
            operation = operation,
            duration_ms = duration_ms,
            warnings = warnings,
            "Operation completed with warnings"
        );
    }
}

/// Run a fallible operation, logging its duration and outcome
pub fn log_timed_operation<F, T>(operation: &str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let start = Instant::now();
    let operation_id = Uuid::new_v4();

    debug!(
        operation = operation,
        operation_id = %operation_id,
        "Starting operation"
    );

    let result = f();
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    match &result {
        Ok(_) => info!(
            operation = operation,
            operation_id = %operation_id,
            duration_ms = duration_ms,
            "Operation completed"
        ),
        Err(e) => error!(
            operation = operation,
            operation_id = %operation_id,
            duration_ms = duration_ms,
            error = %e,
            "Operation failed"
        ),
    }

    result
}

/// Log detailed information about a loaded raster
pub fn log_raster_load_stats(source: &str, raster: &RasterGrid) {
    let (rows, cols) = raster.shape();
    info!(
        operation = "raster_load",
        source = source,
        rows = rows,
        cols = cols,
        nodata = ?raster.nodata,
        crs = raster.crs.as_deref().unwrap_or("unknown"),
        south = raster.bounds.south,
        west = raster.bounds.west,
        north = raster.bounds.north,
        east = raster.bounds.east,
        memory_kb = raster.memory_bytes() / 1024,
        "Raster loaded successfully"
    );
}

/// Log an error with context
pub fn log_error(error: &DroughtMapError, context: &str) {
    error!(
        error = %error,
        context = context,
        error_type = std::any::type_name_of_val(error),
        "Error occurred"
    );
}

/// Log an error that occurred during request processing
pub fn log_request_error(
    error: &DroughtMapError,
    endpoint: &str,
    request_id: &str,
    params: Option<&str>,
) {
    error!(
        error = %error,
        endpoint = endpoint,
        request_id = request_id,
        params = params.unwrap_or("none"),
        error_type = std::any::type_name_of_val(error),
        "Request processing error"
    );
}

/// Generate a unique request ID
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}
