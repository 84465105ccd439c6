use serde::{Deserialize, Serialize};

/// Environment variable names used to configure the adapter and layer
/// from the host process.
///
/// These are purely helpers; the adapter itself never reads the
/// environment.

/// Application name reported with every record.
pub const ERRTRACK_APPLICATION_NAME_ENV: &str = "ERRTRACK_APPLICATION_NAME";

/// Deployment environment, e.g. `production`.
pub const ERRTRACK_ENVIRONMENT_ENV: &str = "ERRTRACK_ENVIRONMENT";

/// Optional device name; falls back to `HOSTNAME`.
pub const ERRTRACK_DEVICE_NAME_ENV: &str = "ERRTRACK_DEVICE_NAME";

/// Optional application location (install path or URL).
pub const ERRTRACK_APP_LOCATION_ENV: &str = "ERRTRACK_APP_LOCATION";

/// Minimum level forwarded by the layer (`trace` .. `error`).
pub const ERRTRACK_MIN_LEVEL_ENV: &str = "ERRTRACK_MIN_LEVEL";

/// Capacity of the channel between the layer and the sink task.
pub const ERRTRACK_CHANNEL_BUFFER_ENV: &str = "ERRTRACK_CHANNEL_BUFFER";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Static description of where the application runs. Attached to every
/// record the adapter produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentDetail {
    pub application_name: String,
    pub environment_name: String,
    pub device_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configured_app_location: Option<String>,
}

impl EnvironmentDetail {
    pub fn new(
        application_name: impl Into<String>,
        environment_name: impl Into<String>,
        device_name: impl Into<String>,
    ) -> Self {
        EnvironmentDetail {
            application_name: application_name.into(),
            environment_name: environment_name.into(),
            device_name: device_name.into(),
            configured_app_location: None,
        }
    }

    /// Build from the `ERRTRACK_*` variables.
    pub fn from_env() -> Self {
        let device = std::env::var(ERRTRACK_DEVICE_NAME_ENV)
            .unwrap_or_else(|_| env_or("HOSTNAME", "localhost"));
        EnvironmentDetail {
            application_name: env_or(ERRTRACK_APPLICATION_NAME_ENV, "unknown"),
            environment_name: env_or(ERRTRACK_ENVIRONMENT_ENV, "development"),
            device_name: device,
            configured_app_location: std::env::var(ERRTRACK_APP_LOCATION_ENV).ok(),
        }
    }
}
