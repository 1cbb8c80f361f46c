//! Error types for nuship modules using thiserror.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::publish::{PublishReport, ToolStep};

/// Errors from package version parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid package version '{0}': expected MAJOR.MINOR.PATCH with numeric components")]
    Parse(String),
}

/// Errors from reading or writing the project file.
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Failed to read project file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write project file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a usable MSBuild project: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("Multiple project files found in {}. Pick one with --project: {}", dir.display(), candidates.join(", "))]
    AmbiguousProject { dir: PathBuf, candidates: Vec<String> },
}

/// Errors from launching or supervising an external tool.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("'{0}' was not found on PATH. Install the .NET SDK or pass --tool")]
    NotInstalled(String),

    #[error("Failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to collect output from '{program}': {source}")]
    OutputFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {}s", limit.as_secs_f64())]
    Timeout { program: String, limit: Duration },
}

/// Errors from resolving the publish configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No package source configured. Pass --source or set NUSHIP_SOURCE")]
    MissingSource,

    #[error("Rollover threshold must be at least 1, got {0}")]
    InvalidRollover(u64),
}

/// Errors from a publish run.
///
/// Anything after the metadata update leaves the bumped version on disk.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(
        "{step} step failed with {}; {} stays at PackageVersion {}",
        exit_code.map_or("no exit code (terminated by signal)".to_string(), |c| format!("exit code {c}")),
        report.project,
        report.new_version
    )]
    ToolFailed {
        step: ToolStep,
        exit_code: Option<i32>,
        report: Box<PublishReport>,
    },

    #[error("Package not found at {} after waiting {}ms", path.display(), waited.as_millis())]
    ArtifactNotFound { path: PathBuf, waited: Duration },
}

impl PublishError {
    /// The partial report collected before the failure, if any.
    pub fn report(&self) -> Option<&PublishReport> {
        match self {
            PublishError::ToolFailed { report, .. } => Some(report),
            _ => None,
        }
    }
}
