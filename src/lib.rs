//! nuship - bump a .NET project's package version, pack it, and push it to a
//! NuGet feed.
//!
//! # Overview
//!
//! nuship reads `PackageVersion` from an MSBuild project file, advances it
//! odometer style, writes it back, then runs `dotnet pack` and
//! `dotnet nuget push` and reports their combined output.

pub mod config;
pub mod error;
pub mod host;
pub mod process;
pub mod project;
pub mod publish;
pub mod version;

// Re-export commonly used types
pub use config::{ConfigOverrides, PublishConfig};
pub use error::{ConfigError, DescriptorError, ProcessError, PublishError, VersionError};
pub use host::{ConsoleHost, Host, ReportFormat};
pub use process::{ProcessOutput, ProcessRunner, SystemRunner, ToolCommand};
pub use project::{MsBuildProject, ProjectDescriptor};
pub use publish::{PublishPlan, PublishReport, PublishStage, ToolStep, publish_project, run_publish};
