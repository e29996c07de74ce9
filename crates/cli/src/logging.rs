// Subscriber setup. Logs go to stderr; stdout is reserved for --json.

use clap::ValueEnum;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Default directive for the given verbosity. `RUST_LOG` wins when set.
pub fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "dutycheck=debug,info"
    } else if quiet {
        "dutycheck=warn,warn"
    } else {
        "dutycheck=info,warn"
    }
}

pub fn init(verbose: bool, quiet: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt.compact()).init(),
        LogFormat::Json => registry.with(fmt.json()).init(),
    }
}
