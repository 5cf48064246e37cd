use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber for a run.
///
/// `RUST_LOG` wins when set, otherwise `default_filter` applies. Logs go to stderr so the
/// run summary on stdout stays machine readable; `compact` drops file/line for long batch runs.
pub fn init_tracing(default_filter: &str, compact: bool) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = if compact {
        builder.compact().try_init()
    } else {
        builder.with_file(true).with_line_number(true).try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}
