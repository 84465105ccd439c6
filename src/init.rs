use crate::adapter::EventAdapter;
use crate::env::{env_or, EnvironmentDetail, ERRTRACK_CHANNEL_BUFFER_ENV, ERRTRACK_MIN_LEVEL_ENV};
use crate::layer::ErrorTrackingLayer;
use crate::level::{Level, ParseLevelError};
use crate::sink::LogSink;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the error-tracking layer.
///
/// **Fields**
/// - `channel_buffer`: maximum number of [`LogMessage`]s queued for the
///   sink before new ones are dropped.
/// - `min_level`: least severe level forwarded to the sink.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   installed next to [`ErrorTrackingLayer`] so events also reach the
///   console.
///
/// [`LogMessage`]: crate::record::LogMessage
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub min_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            min_level: Level::Info,
            enable_stdout: true,
        }
    }
}

/// Error returned when the `ERRTRACK_*` variables hold invalid values.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid ERRTRACK_MIN_LEVEL: {0}")]
    MinLevel(#[from] ParseLevelError),

    #[error("invalid ERRTRACK_CHANNEL_BUFFER {value:?}: {source}")]
    ChannelBuffer {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

impl LayerConfig {
    /// Defaults overridden by `ERRTRACK_MIN_LEVEL` and
    /// `ERRTRACK_CHANNEL_BUFFER` when they are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = LayerConfig::default();

        let min_level = env_or(ERRTRACK_MIN_LEVEL_ENV, defaults.min_level.as_str()).parse::<Level>()?;

        let raw = env_or(ERRTRACK_CHANNEL_BUFFER_ENV, &defaults.channel_buffer.to_string());
        let channel_buffer = raw
            .trim()
            .parse::<usize>()
            .map_err(|source| ConfigError::ChannelBuffer { value: raw.clone(), source })?;

        Ok(LayerConfig {
            channel_buffer,
            min_level,
            ..defaults
        })
    }
}

/// Error returned when the global subscriber cannot be installed.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to install global subscriber: {0}")]
    SetGlobalDefault(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize the global `tracing` subscriber with an
/// [`ErrorTrackingLayer`] built from `env` and `config`.
///
/// **Parameters**
/// - `sink`: implementation of [`LogSink`] that receives the adapted
///   messages.
/// - `env`: environment detail stamped on every record.
/// - `config`: [`LayerConfig`] controlling buffering and filtering.
///
/// **Returns**
/// - the handle of the background task forwarding messages to `sink`;
/// - `Err(InitError)` if a global subscriber was already installed.
///
/// Must be called from within a Tokio runtime.
pub fn init_tracing_with_config(
    sink: Arc<dyn LogSink>,
    env: EnvironmentDetail,
    config: LayerConfig,
) -> Result<JoinHandle<()>, InitError> {
    let (layer, handle) = ErrorTrackingLayer::new(
        sink,
        EventAdapter::new(env),
        config.channel_buffer,
        config.min_level,
    );

    // Two subscriber shapes because the fmt layer changes the type.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(handle)
}

/// Initialize tracing with the environment and layer configuration read
/// from the `ERRTRACK_*` variables, falling back to defaults for any
/// invalid value.
pub fn init_tracing(sink: Arc<dyn LogSink>) -> Result<JoinHandle<()>, InitError> {
    let config = LayerConfig::from_env().unwrap_or_else(|e| {
        eprintln!("{e}; using default layer configuration");
        LayerConfig::default()
    });
    init_tracing_with_config(sink, EnvironmentDetail::from_env(), config)
}
