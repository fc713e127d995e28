//! Tracing subscriber setup shared by the fleet binaries.
//!
//! Behavior is driven entirely by environment variables so deployments can
//! reconfigure logging without a rebuild:
//!
//! - `LOG_LEVEL`: default filter directive when `RUST_LOG` is unset (default `info`)
//! - `LOG_FORMAT`: `human` (default) or `json`
//! - `LOG_OUTPUT`: `console` (default), `file`, or `both`
//! - `LOG_FILE_PATH`: log file location (default `/tmp/fleet.log`)

use std::{env, path::Path};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initializes the global tracing subscriber based on environment variables.
///
/// Returns the worker guard that keeps the non-blocking file writer alive;
/// callers must hold onto it for the lifetime of the process when file
/// output is enabled.
pub fn init_subscriber() -> Option<WorkerGuard> {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "human".to_string());
    let log_output = env::var("LOG_OUTPUT").unwrap_or_else(|_| "console".to_string());
    let log_file_path = env::var("LOG_FILE_PATH").unwrap_or_else(|_| "/tmp/fleet.log".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&log_level))
        .add_directive("hyper=warn".parse().expect("static directive"))
        .add_directive("reqwest=warn".parse().expect("static directive"));

    let use_console = log_output == "console" || log_output == "both";
    let use_file = log_output == "file" || log_output == "both";
    let is_json = log_format == "json";

    let mut guard = None;

    let console_layer = use_console.then(|| {
        let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);
        if is_json {
            layer.json().boxed()
        } else {
            layer.boxed()
        }
    });

    let file_layer = use_file.then(|| {
        let log_path = Path::new(&log_file_path);
        let log_dir = log_path.parent().unwrap_or_else(|| Path::new("/tmp"));
        let log_filename = log_path.file_name().unwrap_or("fleet.log".as_ref());

        let file_appender = tracing_appender::rolling::daily(log_dir, log_filename);
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(file_guard);

        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(non_blocking);
        if is_json {
            layer.json().boxed()
        } else {
            layer.boxed()
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}
