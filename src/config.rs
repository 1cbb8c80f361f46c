//! Publish configuration from CLI flags and environment variables.
//!
//! Precedence is flag, then environment variable, then default.

use std::env;
use std::fmt;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;
use crate::version::DEFAULT_ROLLOVER_THRESHOLD;

pub const TOOL_ENV_VAR: &str = "NUSHIP_TOOL";
pub const CONFIGURATION_ENV_VAR: &str = "NUSHIP_CONFIGURATION";
pub const SOURCE_ENV_VAR: &str = "NUSHIP_SOURCE";
pub const API_KEY_ENV_VAR: &str = "NUSHIP_API_KEY";
pub const ROLLOVER_ENV_VAR: &str = "NUSHIP_ROLLOVER";
pub const TOOL_TIMEOUT_ENV_VAR: &str = "NUSHIP_TOOL_TIMEOUT";
pub const ARTIFACT_WAIT_ENV_VAR: &str = "NUSHIP_ARTIFACT_WAIT";

pub const DEFAULT_TOOL: &str = "dotnet";
pub const DEFAULT_CONFIGURATION: &str = "Release";
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 600;
const DEFAULT_ARTIFACT_WAIT_SECS: u64 = 30;

/// Values given on the command line. `None` falls through to the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub tool: Option<String>,
    pub configuration: Option<String>,
    pub source: Option<String>,
    pub rollover: Option<u64>,
}

/// Resolved settings for a publish run.
#[derive(Clone, PartialEq, Eq)]
pub struct PublishConfig {
    /// Executable that provides `pack` and `nuget push`.
    pub tool: String,
    /// Build configuration passed to pack; also names the output folder.
    pub configuration: String,
    /// Package source the artifact is pushed to.
    pub source: String,
    pub api_key: Option<String>,
    pub rollover_threshold: u64,
    /// `None` disables the tool timeout.
    pub tool_timeout: Option<Duration>,
    /// How long to wait for the package file after pack.
    pub artifact_wait: Duration,
}

impl PublishConfig {
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let tool = overrides
            .tool
            .or_else(|| env_string(TOOL_ENV_VAR))
            .unwrap_or_else(|| DEFAULT_TOOL.to_string());

        let configuration = overrides
            .configuration
            .or_else(|| env_string(CONFIGURATION_ENV_VAR))
            .unwrap_or_else(|| DEFAULT_CONFIGURATION.to_string());

        let source = overrides
            .source
            .or_else(|| env_string(SOURCE_ENV_VAR))
            .ok_or(ConfigError::MissingSource)?;

        let rollover_threshold = overrides
            .rollover
            .unwrap_or_else(|| env_u64(ROLLOVER_ENV_VAR, DEFAULT_ROLLOVER_THRESHOLD));
        if rollover_threshold == 0 {
            return Err(ConfigError::InvalidRollover(rollover_threshold));
        }

        let tool_timeout = match env_u64(TOOL_TIMEOUT_ENV_VAR, DEFAULT_TOOL_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let artifact_wait =
            Duration::from_secs(env_u64(ARTIFACT_WAIT_ENV_VAR, DEFAULT_ARTIFACT_WAIT_SECS));

        Ok(Self {
            tool,
            configuration,
            source,
            api_key: env_string(API_KEY_ENV_VAR),
            rollover_threshold,
            tool_timeout,
            artifact_wait,
        })
    }
}

impl fmt::Debug for PublishConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishConfig")
            .field("tool", &self.tool)
            .field("configuration", &self.configuration)
            .field("source", &self.source)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("rollover_threshold", &self.rollover_threshold)
            .field("tool_timeout", &self.tool_timeout)
            .field("artifact_wait", &self.artifact_wait)
            .finish()
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read a numeric environment variable.
///
/// Logs a warning and returns `default` if the variable is set but is not a
/// non-negative integer.
fn env_u64(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => match v.trim().parse::<u64>() {
            Ok(n) => n,
            Err(_) => {
                warn!("Invalid {} value '{}', using default {}", name, v, default);
                default
            }
        },
        _ => default,
    }
}
