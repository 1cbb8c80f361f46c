//! Publish run results.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::process::ProcessOutput;

/// Progress of a publish run. Transitions are strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStage {
    Idle,
    MetadataUpdated,
    Packed,
    Pushed,
    Reported,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishStage::Idle => "idle",
            PublishStage::MetadataUpdated => "metadata updated",
            PublishStage::Packed => "packed",
            PublishStage::Pushed => "pushed",
            PublishStage::Reported => "reported",
        };
        f.write_str(name)
    }
}

/// The external tool steps of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStep {
    Pack,
    Push,
}

impl fmt::Display for ToolStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStep::Pack => write!(f, "pack"),
            ToolStep::Push => write!(f, "push"),
        }
    }
}

/// One tool invocation and what it printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: ToolStep,
    /// Redacted command line.
    pub command: String,
    #[serde(flatten)]
    pub output: ProcessOutput,
}

/// Everything a publish run did, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub project: String,
    /// Last stage the run reached.
    pub stage: PublishStage,
    pub previous_version: Option<String>,
    pub new_version: String,
    pub package_id_added: bool,
    pub artifact: PathBuf,
    pub steps: Vec<StepReport>,
}

impl PublishReport {
    /// Standard output of every step, in the order it was produced.
    pub fn output_lines(&self) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .flat_map(|s| s.output.stdout_lines.iter().map(String::as_str))
    }

    pub fn succeeded(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.output.success())
    }

    /// Text shown to the user: all captured stdout lines, newline-joined,
    /// followed by stderr and exit status of any step that complained.
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self.output_lines().map(String::from).collect();

        for step in &self.steps {
            if !step.output.stderr_lines.is_empty() {
                lines.push(format!("--- {} stderr ---", step.step));
                lines.extend(step.output.stderr_lines.iter().cloned());
            }
            if !step.output.success() {
                let status = step
                    .output
                    .exit_code
                    .map_or("was terminated".to_string(), |c| format!("exited with code {c}"));
                lines.push(format!("--- {} {} ---", step.step, status));
            }
        }

        lines.join("\n")
    }
}
