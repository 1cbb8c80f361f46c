//! The environment a publish runs in: which project is selected and where
//! the report goes.

use tracing::warn;

use crate::project::ProjectDescriptor;
use crate::publish::PublishReport;

/// Capabilities the publish pipeline needs from its caller.
pub trait Host {
    /// The project to publish, or `None` when nothing is selected.
    fn selected_project(&self) -> Option<ProjectDescriptor>;

    /// Present the finished (or partial) report.
    fn show_report(&self, report: &PublishReport);
}

/// How the console host prints reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Host for the command line: a fixed project and stdout.
#[derive(Debug, Clone)]
pub struct ConsoleHost {
    project: Option<ProjectDescriptor>,
    format: ReportFormat,
}

impl ConsoleHost {
    pub fn new(project: Option<ProjectDescriptor>, format: ReportFormat) -> Self {
        Self { project, format }
    }
}

impl Host for ConsoleHost {
    fn selected_project(&self) -> Option<ProjectDescriptor> {
        self.project.clone()
    }

    fn show_report(&self, report: &PublishReport) {
        match self.format {
            ReportFormat::Text => {
                println!();
                println!("Publish Result");
                println!("{}", report.render());
            }
            ReportFormat::Json => match serde_json::to_string_pretty(report) {
                Ok(json) => println!("{}", json),
                Err(e) => warn!("Failed to serialize report: {}", e),
            },
        }
    }
}
