//! Publish pipeline: bump the version, pack, wait for the package, push,
//! and report.
//!
//! The version bump is saved before the tools run and is not rolled back if
//! pack or push fails.

pub mod artifact;
pub mod report;

use std::path::PathBuf;

use semver::Version;
use tracing::{debug, info, warn};

use crate::config::PublishConfig;
use crate::error::PublishError;
use crate::host::Host;
use crate::process::{ProcessRunner, ToolCommand};
use crate::project::{MsBuildProject, PACKAGE_ID, PACKAGE_VERSION, ProjectDescriptor};
use crate::version::resolve_next_version;

pub use artifact::{artifact_path, wait_for_artifact};
pub use report::{PublishReport, PublishStage, StepReport, ToolStep};

impl PublishStage {
    /// The stage after this one. `Reported` is terminal.
    pub fn next(self) -> Self {
        match self {
            PublishStage::Idle => PublishStage::MetadataUpdated,
            PublishStage::MetadataUpdated => PublishStage::Packed,
            PublishStage::Packed => PublishStage::Pushed,
            PublishStage::Pushed | PublishStage::Reported => PublishStage::Reported,
        }
    }
}

fn advance(stage: &mut PublishStage) {
    let next = stage.next();
    info!(from = %stage, to = %next, "Publish stage");
    *stage = next;
}

/// What a publish run will do, computed without touching anything.
#[derive(Debug, Clone)]
pub struct PublishPlan {
    pub project: ProjectDescriptor,
    pub previous_version: Option<String>,
    pub new_version: Version,
    /// `PackageId` is missing and will be set to the project name.
    pub add_package_id: bool,
    pub artifact: PathBuf,
    pub pack: ToolCommand,
    pub push: ToolCommand,
}

fn prepare(
    project: &ProjectDescriptor,
    config: &PublishConfig,
) -> Result<(MsBuildProject, PublishPlan), PublishError> {
    let doc = MsBuildProject::open(&project.file)?;

    let metadata = doc.metadata();
    let previous_version = metadata.get(PACKAGE_VERSION).cloned();
    let new_version = resolve_next_version(previous_version.as_deref(), config.rollover_threshold)?;
    let add_package_id = metadata
        .get(PACKAGE_ID)
        .is_none_or(|id| id.trim().is_empty());

    let artifact = artifact_path(
        &project.base_dir,
        &project.name,
        &new_version,
        &config.configuration,
    );
    let pack = ToolCommand::pack(&config.tool, &project.file, &config.configuration);
    let push = ToolCommand::push(
        &config.tool,
        &artifact,
        &config.source,
        config.api_key.as_deref(),
    );

    let plan = PublishPlan {
        project: project.clone(),
        previous_version,
        new_version,
        add_package_id,
        artifact,
        pack,
        push,
    };
    Ok((doc, plan))
}

/// Compute the plan for `project` without side effects.
pub fn plan_publish(
    project: &ProjectDescriptor,
    config: &PublishConfig,
) -> Result<PublishPlan, PublishError> {
    prepare(project, config).map(|(_, plan)| plan)
}

/// Bump, pack, and push `project`.
///
/// Stops at the first failure. A tool that exits non-zero yields
/// `ToolFailed` carrying the report collected so far.
pub async fn publish_project<R>(
    project: &ProjectDescriptor,
    runner: &R,
    config: &PublishConfig,
) -> Result<PublishReport, PublishError>
where
    R: ProcessRunner + ?Sized,
{
    let (mut doc, plan) = prepare(project, config)?;
    let mut stage = PublishStage::Idle;

    // ── Idle → MetadataUpdated ──
    let new_version = plan.new_version.to_string();
    doc.set_property(PACKAGE_VERSION, &new_version)?;
    if plan.add_package_id {
        doc.set_property(PACKAGE_ID, &project.name)?;
    }
    doc.save()?;
    info!(
        project = %project.name,
        from = plan.previous_version.as_deref().unwrap_or("none"),
        to = %new_version,
        "Updated package version"
    );
    advance(&mut stage);

    let mut report = PublishReport {
        project: project.name.clone(),
        stage,
        previous_version: plan.previous_version.clone(),
        new_version,
        package_id_added: plan.add_package_id,
        artifact: plan.artifact.clone(),
        steps: Vec::with_capacity(2),
    };

    // ── MetadataUpdated → Packed ──
    run_step(runner, ToolStep::Pack, &plan.pack, &mut report).await?;
    wait_for_artifact(&plan.artifact, config.artifact_wait).await?;
    advance(&mut report.stage);

    // ── Packed → Pushed ──
    run_step(runner, ToolStep::Push, &plan.push, &mut report).await?;
    advance(&mut report.stage);

    debug!(stage = %report.stage, "Publish tools finished");
    Ok(report)
}

async fn run_step<R>(
    runner: &R,
    step: ToolStep,
    command: &ToolCommand,
    report: &mut PublishReport,
) -> Result<(), PublishError>
where
    R: ProcessRunner + ?Sized,
{
    let output = runner.run(command).await?;
    let exit_code = output.exit_code;
    let success = output.success();

    report.steps.push(StepReport {
        step,
        command: command.display_redacted(),
        output,
    });

    if !success {
        warn!(%step, ?exit_code, "Tool step failed");
        return Err(PublishError::ToolFailed {
            step,
            exit_code,
            report: Box::new(report.clone()),
        });
    }

    Ok(())
}

/// Publish the host's selected project and hand the report back to the host.
///
/// Returns `Ok(None)` without doing anything when no project is selected.
/// A partial report is still shown when a tool step fails.
pub async fn run_publish<H, R>(
    host: &H,
    runner: &R,
    config: &PublishConfig,
) -> Result<Option<PublishReport>, PublishError>
where
    H: Host + ?Sized,
    R: ProcessRunner + ?Sized,
{
    let Some(project) = host.selected_project() else {
        debug!("No project selected, nothing to publish");
        return Ok(None);
    };

    match publish_project(&project, runner, config).await {
        Ok(mut report) => {
            // ── Pushed → Reported ──
            advance(&mut report.stage);
            host.show_report(&report);
            Ok(Some(report))
        }
        Err(err) => {
            if let Some(report) = err.report() {
                host.show_report(report);
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use crate::error::ProcessError;
    use crate::process::ProcessOutput;
    use crate::process::runner::MockProcessRunner;

    const PROJECT: &str = "<Project Sdk=\"Microsoft.NET.Sdk\">\n  <PropertyGroup>\n    <TargetFramework>net8.0</TargetFramework>\n    <PackageVersion>1.2.9</PackageVersion>\n  </PropertyGroup>\n</Project>\n";

    fn config() -> PublishConfig {
        PublishConfig {
            tool: "dotnet".to_string(),
            configuration: "Release".to_string(),
            source: "https://nuget.example/v3/index.json".to_string(),
            api_key: Some("s3cret".to_string()),
            rollover_threshold: 10,
            tool_timeout: None,
            artifact_wait: Duration::ZERO,
        }
    }

    fn write_project(dir: &Path, content: &str) -> ProjectDescriptor {
        let file = dir.join("Foo.csproj");
        fs::write(&file, content).unwrap();
        ProjectDescriptor::from_file(&file).unwrap()
    }

    fn ok_output(lines: &[&str]) -> ProcessOutput {
        ProcessOutput {
            exit_code: Some(0),
            stdout_lines: lines.iter().map(|s| s.to_string()).collect(),
            stderr_lines: Vec::new(),
        }
    }

    fn is_pack(cmd: &ToolCommand) -> bool {
        cmd.args.first().map(String::as_str) == Some("pack")
    }

    fn is_push(cmd: &ToolCommand) -> bool {
        cmd.args.get(1).map(String::as_str) == Some("push")
    }

    /// Pack mock that drops the expected package file, like `dotnet pack` does.
    fn expect_pack(runner: &mut MockProcessRunner, artifact: PathBuf) {
        runner
            .expect_run()
            .withf(|cmd| is_pack(cmd))
            .times(1)
            .returning(move |_| {
                fs::create_dir_all(artifact.parent().unwrap()).unwrap();
                fs::write(&artifact, b"nupkg").unwrap();
                Ok(ok_output(&["Successfully created package."]))
            });
    }

    struct RecordingHost {
        project: Option<ProjectDescriptor>,
        shown: RefCell<Vec<PublishReport>>,
    }

    impl Host for RecordingHost {
        fn selected_project(&self) -> Option<ProjectDescriptor> {
            self.project.clone()
        }

        fn show_report(&self, report: &PublishReport) {
            self.shown.borrow_mut().push(report.clone());
        }
    }

    #[test]
    fn test_stage_order() {
        let mut stage = PublishStage::Idle;
        let mut seen = vec![stage];
        for _ in 0..4 {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                PublishStage::Idle,
                PublishStage::MetadataUpdated,
                PublishStage::Packed,
                PublishStage::Pushed,
                PublishStage::Reported,
            ]
        );
        assert_eq!(PublishStage::Reported.next(), PublishStage::Reported);
    }

    #[test]
    fn test_plan_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let project = write_project(dir.path(), PROJECT);

        let plan = plan_publish(&project, &config()).unwrap();

        assert_eq!(plan.previous_version.as_deref(), Some("1.2.9"));
        assert_eq!(plan.new_version, Version::new(1, 3, 0));
        assert!(plan.add_package_id);
        assert_eq!(plan.artifact, dir.path().join("bin/Release/Foo.1.3.0.nupkg"));
        assert_eq!(fs::read_to_string(&project.file).unwrap(), PROJECT);
    }

    #[tokio::test]
    async fn test_publish_bumps_packs_and_pushes() {
        let dir = tempfile::tempdir().unwrap();
        let project = write_project(dir.path(), PROJECT);
        let artifact = dir.path().join("bin/Release/Foo.1.3.0.nupkg");

        let mut runner = MockProcessRunner::new();
        expect_pack(&mut runner, artifact.clone());
        let expected_artifact = artifact.to_string_lossy().to_string();
        runner
            .expect_run()
            .withf(move |cmd| {
                is_push(cmd)
                    && cmd.args[2] == expected_artifact
                    && cmd.args.contains(&"https://nuget.example/v3/index.json".to_string())
            })
            .times(1)
            .returning(|_| Ok(ok_output(&["Your package was pushed."])));

        let report = publish_project(&project, &runner, &config()).await.unwrap();

        let saved = fs::read_to_string(&project.file).unwrap();
        assert!(saved.contains("<PackageVersion>1.3.0</PackageVersion>"));
        assert!(saved.contains("<PackageId>Foo</PackageId>"));

        assert!(report.succeeded());
        assert_eq!(report.stage, PublishStage::Pushed);
        assert!(report.package_id_added);
        assert_eq!(report.new_version, "1.3.0");
        assert_eq!(
            report.render(),
            "Successfully created package.\nYour package was pushed."
        );
        assert!(report.steps[1].command.ends_with("--api-key ***"));
    }

    #[tokio::test]
    async fn test_existing_package_id_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let content = PROJECT.replace(
            "    <PackageVersion>",
            "    <PackageId>Acme.Foo</PackageId>\n    <PackageVersion>",
        );
        let project = write_project(dir.path(), &content);

        let mut runner = MockProcessRunner::new();
        expect_pack(&mut runner, dir.path().join("bin/Release/Foo.1.3.0.nupkg"));
        runner
            .expect_run()
            .withf(|cmd| is_push(cmd))
            .returning(|_| Ok(ok_output(&[])));

        let report = publish_project(&project, &runner, &config()).await.unwrap();

        assert!(!report.package_id_added);
        let saved = fs::read_to_string(&project.file).unwrap();
        assert!(saved.contains("<PackageId>Acme.Foo</PackageId>"));
        assert!(!saved.contains("<PackageId>Foo</PackageId>"));
    }

    #[tokio::test]
    async fn test_pack_failure_stops_before_push_but_keeps_bump() {
        let dir = tempfile::tempdir().unwrap();
        let project = write_project(dir.path(), PROJECT);

        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|cmd| is_pack(cmd))
            .times(1)
            .returning(|_| {
                Ok(ProcessOutput {
                    exit_code: Some(1),
                    stdout_lines: vec!["Build FAILED.".to_string()],
                    stderr_lines: vec!["error CS1002: ; expected".to_string()],
                })
            });
        runner.expect_run().withf(|cmd| is_push(cmd)).times(0);

        let err = publish_project(&project, &runner, &config())
            .await
            .unwrap_err();

        match &err {
            PublishError::ToolFailed {
                step,
                exit_code,
                report,
            } => {
                assert_eq!(*step, ToolStep::Pack);
                assert_eq!(*exit_code, Some(1));
                assert_eq!(report.stage, PublishStage::MetadataUpdated);
                assert_eq!(report.steps.len(), 1);
                assert!(report.render().contains("error CS1002"));
            }
            other => panic!("Expected ToolFailed, got {:?}", other),
        }

        let saved = fs::read_to_string(&project.file).unwrap();
        assert!(saved.contains("<PackageVersion>1.3.0</PackageVersion>"));
    }

    #[tokio::test]
    async fn test_missing_pack_tool_aborts_but_keeps_bump() {
        let dir = tempfile::tempdir().unwrap();
        let project = write_project(dir.path(), PROJECT);

        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|cmd| is_pack(cmd))
            .times(1)
            .returning(|cmd| Err(ProcessError::NotInstalled(cmd.program.clone())));
        runner.expect_run().withf(|cmd| is_push(cmd)).times(0);

        let err = publish_project(&project, &runner, &config())
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            PublishError::Process(ProcessError::NotInstalled(program)) if program == "dotnet"
        ));
        assert!(err.report().is_none());
        let saved = fs::read_to_string(&project.file).unwrap();
        assert!(saved.contains("<PackageVersion>1.3.0</PackageVersion>"));
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_before_push() {
        let dir = tempfile::tempdir().unwrap();
        let project = write_project(dir.path(), PROJECT);

        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|cmd| is_pack(cmd))
            .returning(|_| Ok(ok_output(&["Nothing to pack"])));
        runner.expect_run().withf(|cmd| is_push(cmd)).times(0);

        let err = publish_project(&project, &runner, &config())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::ArtifactNotFound { .. }));
    }

    #[tokio::test]
    async fn test_malformed_version_aborts_before_any_change() {
        let dir = tempfile::tempdir().unwrap();
        let content = PROJECT.replace("1.2.9", "1.2");
        let project = write_project(dir.path(), &content);

        let runner = MockProcessRunner::new();
        let err = publish_project(&project, &runner, &config())
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Version(_)));
        assert_eq!(fs::read_to_string(&project.file).unwrap(), content);
    }

    #[tokio::test]
    async fn test_run_publish_without_project_is_noop() {
        let host = RecordingHost {
            project: None,
            shown: RefCell::new(Vec::new()),
        };
        let runner = MockProcessRunner::new();

        let result = run_publish(&host, &runner, &config()).await.unwrap();

        assert!(result.is_none());
        assert!(host.shown.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_run_publish_reaches_reported_stage() {
        let dir = tempfile::tempdir().unwrap();
        let project = write_project(dir.path(), PROJECT);
        let host = RecordingHost {
            project: Some(project),
            shown: RefCell::new(Vec::new()),
        };

        let mut runner = MockProcessRunner::new();
        expect_pack(&mut runner, dir.path().join("bin/Release/Foo.1.3.0.nupkg"));
        runner
            .expect_run()
            .withf(|cmd| is_push(cmd))
            .returning(|_| Ok(ok_output(&["Your package was pushed."])));

        let report = run_publish(&host, &runner, &config()).await.unwrap().unwrap();

        assert_eq!(report.stage, PublishStage::Reported);
        assert_eq!(*host.shown.borrow(), vec![report]);
    }

    #[tokio::test]
    async fn test_run_publish_shows_partial_report_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let project = write_project(dir.path(), PROJECT);
        let host = RecordingHost {
            project: Some(project),
            shown: RefCell::new(Vec::new()),
        };

        let mut runner = MockProcessRunner::new();
        expect_pack(&mut runner, dir.path().join("bin/Release/Foo.1.3.0.nupkg"));
        runner
            .expect_run()
            .withf(|cmd| is_push(cmd))
            .returning(|_| {
                Ok(ProcessOutput {
                    exit_code: Some(1),
                    stdout_lines: vec!["Pushing Foo.1.3.0.nupkg".to_string()],
                    stderr_lines: vec!["error: Response status code does not indicate success: 401".to_string()],
                })
            });

        let err = run_publish(&host, &runner, &config()).await.unwrap_err();

        assert!(matches!(err, PublishError::ToolFailed { step: ToolStep::Push, .. }));
        let shown = host.shown.borrow();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].stage, PublishStage::Packed);
        assert_eq!(shown[0].steps.len(), 2);
        assert!(shown[0].render().contains("401"));
    }
}
