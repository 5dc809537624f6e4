use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Log to stderr so diagnostics never mix with the relayed remote output.
pub fn init_logging(verbosity: u8) {
    // 0 = warnings only, 1 (-v) = info, 2+ (-vv) = debug
    let filter = match verbosity {
        0 => "warn",
        1 => "info,russh=warn",
        _ => "debug",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(stderr)
        .with_target(false)
        .compact()
        .init();
}
