//! Locating the project to publish.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::DescriptorError;

/// File extensions recognised as MSBuild project files.
pub const PROJECT_EXTENSIONS: [&str; 3] = ["csproj", "fsproj", "vbproj"];

/// The project selected for publishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDescriptor {
    /// Project name, taken from the project file stem.
    pub name: String,
    /// Path to the project file.
    pub file: PathBuf,
    /// Directory containing the project file.
    pub base_dir: PathBuf,
}

impl ProjectDescriptor {
    pub fn from_file(file: &Path) -> Result<Self, DescriptorError> {
        let name = file
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DescriptorError::Malformed {
                path: file.to_path_buf(),
                reason: "project file name is not valid UTF-8".into(),
            })?;

        let base_dir = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            name: name.to_string(),
            file: file.to_path_buf(),
            base_dir,
        })
    }
}

fn is_project_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| PROJECT_EXTENSIONS.contains(&ext))
}

/// Find the single project file in `dir`.
///
/// Returns `Ok(None)` when there is none and `AmbiguousProject` when there
/// is more than one.
pub fn find_project_file(dir: &Path) -> Result<Option<PathBuf>, DescriptorError> {
    let entries = std::fs::read_dir(dir).map_err(|source| DescriptorError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_project_file(path))
        .collect();
    candidates.sort();

    match candidates.len() {
        0 => {
            debug!(dir = %dir.display(), "No project file found");
            Ok(None)
        }
        1 => Ok(candidates.pop()),
        _ => Err(DescriptorError::AmbiguousProject {
            dir: dir.to_path_buf(),
            candidates: candidates
                .iter()
                .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
                .collect(),
        }),
    }
}

/// Resolve the project from an optional `--project` argument.
///
/// A directory argument (or no argument, meaning `cwd`) is searched for a
/// single project file; a file argument is used as-is.
pub fn resolve_project(
    arg: Option<&Path>,
    cwd: &Path,
) -> Result<Option<ProjectDescriptor>, DescriptorError> {
    let file = match arg {
        Some(path) if path.is_dir() => find_project_file(path)?,
        Some(path) => Some(path.to_path_buf()),
        None => find_project_file(cwd)?,
    };

    file.as_deref().map(ProjectDescriptor::from_file).transpose()
}
