use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Output format of the stderr layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

pub struct TracingBuilder {
    level: Level,
    format: LogFormat,
}

impl Default for TracingBuilder {
    fn default() -> Self {
        TracingBuilder {
            level: Level::INFO,
            format: LogFormat::default(),
        }
    }
}

impl TracingBuilder {
    /// Set the log level. RUST_LOG still has a higher priority over this value.
    pub fn level(mut self, level: Level) -> TracingBuilder {
        self.level = level;
        self
    }

    /// Set the output format, default is [LogFormat::Compact].
    pub fn format(mut self, format: LogFormat) -> TracingBuilder {
        self.format = format;
        self
    }

    /// Shorthand for `format(LogFormat::Json)`.
    pub fn json(self) -> TracingBuilder {
        self.format(LogFormat::Json)
    }

    /// This will setup tracing based on the configuration passed in.
    /// It installs a stderr writer output layer and a EnvFilter based on the
    /// provided log level (RUST_LOG still has a higher priority over the
    /// configured value).
    ///
    /// Logs go to stderr only, stdout stays reserved for command output
    /// (blob contents, handles).
    pub fn build(self) -> Result<(), Error> {
        let filter = EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env_lossy();

        let fmt_layer = tracing_subscriber::fmt::Layer::new().with_writer(std::io::stderr);

        let registry = tracing_subscriber::registry().with(filter);

        match self.format {
            LogFormat::Compact => registry.with(fmt_layer.compact()).try_init()?,
            LogFormat::Pretty => registry.with(fmt_layer.pretty()).try_init()?,
            LogFormat::Json => registry.with(fmt_layer.json()).try_init()?,
        }

        Ok(())
    }
}
