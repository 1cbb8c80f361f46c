//! Structured tool invocations.
//!
//! Commands are argument vectors handed straight to the OS, never shell
//! strings, so paths with spaces or metacharacters reach the tool intact.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Replacement shown for secret arguments.
const REDACTED: &str = "***";

/// An external command and its arguments.
#[derive(Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    secret_args: BTreeSet<usize>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            secret_args: BTreeSet::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add an argument that must never be logged or reported.
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret_args.insert(self.args.len());
        self.args.push(arg.into());
        self
    }

    /// `{tool} pack {project} --configuration {configuration}`
    pub fn pack(tool: &str, project_file: &Path, configuration: &str) -> Self {
        Self::new(tool)
            .arg("pack")
            .arg(project_file.to_string_lossy())
            .arg("--configuration")
            .arg(configuration)
    }

    /// `{tool} nuget push {artifact} --source {source} [--api-key {key}]`
    pub fn push(tool: &str, artifact: &Path, source: &str, api_key: Option<&str>) -> Self {
        let command = Self::new(tool)
            .arg("nuget")
            .arg("push")
            .arg(artifact.to_string_lossy())
            .arg("--source")
            .arg(source);

        match api_key {
            Some(key) => command.arg("--api-key").secret_arg(key),
            None => command,
        }
    }

    /// Command line for display, with secrets masked and spaced arguments quoted.
    pub fn display_redacted(&self) -> String {
        let mut parts = vec![quote(&self.program)];
        for (idx, arg) in self.args.iter().enumerate() {
            if self.secret_args.contains(&idx) {
                parts.push(REDACTED.to_string());
            } else {
                parts.push(quote(arg));
            }
        }
        parts.join(" ")
    }
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(char::is_whitespace) {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_redacted())
    }
}

// Debug goes through the redacted form so secrets stay out of logs and panics.
impl fmt::Debug for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ToolCommand")
            .field(&self.display_redacted())
            .finish()
    }
}
