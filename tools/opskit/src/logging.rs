//! Logger setup shared by the command-line tools.

use simplelog::{CombinedLogger, Config as LogConfig, ConfigBuilder, LevelFilter, SimpleLogger};
use snafu::ResultExt;

/// Crates whose INFO output is noise for a user of these tools.
const NOISY_CRATES: &[&str] = &[
    "aws_config",
    "aws_credential_types",
    "aws_runtime",
    "aws_smithy",
    "hyper",
    "rustls",
    "tracing::span",
];

/// Initializes the global logger at the given level.
pub fn init(level: LevelFilter) -> Result<()> {
    // SimpleLogger will send errors to stderr and anything less to stdout.
    // To reduce verbosity of messages related to the AWS SDK for Rust we need
    // to spin up two loggers, setting different levels for each. This allows
    // us to retain the mixed logging of stdout/stderr in simplelog.
    match level {
        LevelFilter::Info => {
            let mut ours = ConfigBuilder::new();
            let mut sdk = ConfigBuilder::new();
            for &name in NOISY_CRATES {
                ours.add_filter_ignore_str(name);
                sdk.add_filter_allow_str(name);
            }
            CombinedLogger::init(vec![
                SimpleLogger::new(LevelFilter::Info, ours.build()),
                SimpleLogger::new(LevelFilter::Warn, sdk.build()),
            ])
            .context(error::LoggerSnafu)
        }
        _ => SimpleLogger::init(level, LogConfig::default()).context(error::LoggerSnafu),
    }
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("Logger setup error: {}", source))]
        Logger { source: log::SetLoggerError },
    }
}
pub use error::Error;
type Result<T> = std::result::Result<T, error::Error>;
