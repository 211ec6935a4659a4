//! Tracing bootstrap for binaries and demos.

use tracing_subscriber::EnvFilter;

/// Install a stdout `tracing` subscriber filtered by `RUST_LOG`.
///
/// Falls back to `info,waystack_runtime=debug` when `RUST_LOG` is unset.
/// Calling it twice is harmless; the second install is ignored.
pub fn init_stdout_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,waystack_runtime=debug"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Like [`init_stdout_tracing`], but writes to stderr so stdout stays
/// machine-readable. Defaults to `warn` when `RUST_LOG` is unset.
pub fn init_stderr_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
