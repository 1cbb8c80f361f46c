//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use nuship::error::ProcessError;
use nuship::{ProcessOutput, ProcessRunner, ProjectDescriptor, PublishConfig, ToolCommand};

/// Get the path to test fixtures directory.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Get the path to a project fixture.
pub fn project_fixture(name: &str) -> PathBuf {
    fixtures_dir().join("projects").join(name)
}

/// Read a file as a string.
pub fn read_file(path: &Path) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {:?}: {}", path, e))
}

/// A project fixture copied into its own temp directory.
pub struct TestProject {
    pub dir: tempfile::TempDir,
    pub descriptor: ProjectDescriptor,
}

impl TestProject {
    /// Copy `fixture` into a fresh directory as `{name}.csproj`.
    pub fn from_fixture(fixture: &str, name: &str) -> Self {
        let content = read_file(&project_fixture(fixture));
        Self::with_content(name, &content)
    }

    /// Write `content` into a fresh directory as `{name}.csproj`.
    pub fn with_content(name: &str, content: &str) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let file = dir.path().join(format!("{}.csproj", name));
        std::fs::write(&file, content).expect("Failed to write project file");
        let descriptor = ProjectDescriptor::from_file(&file).expect("Invalid project path");
        Self { dir, descriptor }
    }

    pub fn content(&self) -> String {
        read_file(&self.descriptor.file)
    }

    pub fn artifact(&self, configuration: &str, version: &str) -> PathBuf {
        self.dir
            .path()
            .join("bin")
            .join(configuration)
            .join(format!("{}.{}.nupkg", self.descriptor.name, version))
    }
}

/// Configuration for tests: no timeout, no artifact wait.
pub fn test_config() -> PublishConfig {
    PublishConfig {
        tool: "dotnet".to_string(),
        configuration: "Release".to_string(),
        source: "https://nuget.example/v3/index.json".to_string(),
        api_key: Some("test-key".to_string()),
        rollover_threshold: 10,
        tool_timeout: None,
        artifact_wait: Duration::ZERO,
    }
}

/// Runner that records every command and plays back scripted results.
///
/// A successful pack creates the package file named in the pack output
/// directory, the way `dotnet pack` would.
pub struct FakeRunner {
    pub pack_exit: i32,
    pub push_exit: i32,
    /// Package file to create on a successful pack.
    pub creates: Option<PathBuf>,
    pub calls: Mutex<Vec<ToolCommand>>,
}

impl FakeRunner {
    pub fn new(creates: Option<PathBuf>) -> Self {
        Self {
            pack_exit: 0,
            push_exit: 0,
            creates,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ProcessOutput, ProcessError> {
        self.calls.lock().unwrap().push(command.clone());

        let is_pack = command.args.first().map(String::as_str) == Some("pack");
        let exit = if is_pack { self.pack_exit } else { self.push_exit };

        if is_pack
            && exit == 0
            && let Some(path) = &self.creates
        {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"PK").unwrap();
        }

        let step = if is_pack { "pack" } else { "push" };
        Ok(ProcessOutput {
            exit_code: Some(exit),
            stdout_lines: vec![format!("{} stdout", step)],
            stderr_lines: if exit == 0 {
                Vec::new()
            } else {
                vec![format!("{} failed", step)]
            },
        })
    }
}
