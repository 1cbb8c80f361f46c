//! Project files: discovery and property editing.

pub mod discovery;
pub mod msbuild;

pub use discovery::{ProjectDescriptor, find_project_file, resolve_project};
pub use msbuild::{MsBuildProject, PACKAGE_ID, PACKAGE_VERSION, PackageMetadata};
