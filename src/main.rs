//! nuship - CLI entry point.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::Confirm;
use tracing_subscriber::EnvFilter;

use nuship::project::resolve_project;
use nuship::publish::plan_publish;
use nuship::{ConfigOverrides, ConsoleHost, PublishConfig, ReportFormat, SystemRunner, run_publish};

/// Bump, pack, and push a NuGet package.
#[derive(Parser, Debug)]
#[command(name = "nuship")]
#[command(about = "Bump a project's package version, pack it, and push it to a NuGet feed")]
#[command(version)]
struct Cli {
    /// Project file or directory (defaults to the project in the current directory)
    #[arg(long)]
    project: Option<PathBuf>,

    /// Package source to push to (or NUSHIP_SOURCE)
    #[arg(long)]
    source: Option<String>,

    /// Executable providing pack and nuget push (or NUSHIP_TOOL, default dotnet)
    #[arg(long)]
    tool: Option<String>,

    /// Build configuration (or NUSHIP_CONFIGURATION, default Release)
    #[arg(short = 'c', long)]
    configuration: Option<String>,

    /// Rollover threshold for minor and patch (or NUSHIP_ROLLOVER, default 10)
    #[arg(long)]
    rollover: Option<u64>,

    /// Show what would happen without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default = if verbose { "nuship=debug" } else { "nuship=info" };
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::new(default),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

/// Where progress messages go. With `--json`, stdout carries only the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageStream {
    Stdout,
    Stderr,
}

impl MessageStream {
    fn for_cli(cli: &Cli) -> Self {
        if cli.json {
            MessageStream::Stderr
        } else {
            MessageStream::Stdout
        }
    }

    fn writer(self) -> Box<dyn Write> {
        match self {
            MessageStream::Stdout => Box::new(io::stdout()),
            MessageStream::Stderr => Box::new(io::stderr()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let mut out = MessageStream::for_cli(&cli).writer();
    run(cli, &cwd, &mut *out).await
}

async fn run(cli: Cli, cwd: &Path, out: &mut dyn Write) -> Result<()> {
    let Some(project) = resolve_project(cli.project.as_deref(), cwd)? else {
        writeln!(out, "No project file found. Nothing to publish.")?;
        return Ok(());
    };

    let config = PublishConfig::resolve(ConfigOverrides {
        tool: cli.tool,
        configuration: cli.configuration,
        source: cli.source,
        rollover: cli.rollover,
    })
    .context("Invalid configuration")?;
    tracing::debug!(?config, "Resolved configuration");

    let plan = plan_publish(&project, &config)
        .with_context(|| format!("Failed to plan publish for {}", project.file.display()))?;

    writeln!(out, "Summary:")?;
    writeln!(out, "  Project:   {}", project.file.display())?;
    writeln!(
        out,
        "  Version:   {} -> {}",
        plan.previous_version.as_deref().unwrap_or("none"),
        plan.new_version
    )?;
    if plan.add_package_id {
        writeln!(out, "  PackageId: {} (added)", project.name)?;
    }
    writeln!(out, "  Pack:      {}", plan.pack)?;
    writeln!(out, "  Push:      {}", plan.push)?;

    if cli.dry_run {
        writeln!(out)?;
        writeln!(out, "Dry run complete. No changes made.")?;
        return Ok(());
    }

    if !cli.yes {
        writeln!(out)?;
        out.flush()?;
        let confirmed = Confirm::new()
            .with_prompt("Proceed?")
            .default(true)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            writeln!(out, "Cancelled.")?;
            return Ok(());
        }
    }
    out.flush()?;

    let format = if cli.json {
        ReportFormat::Json
    } else {
        ReportFormat::Text
    };
    let host = ConsoleHost::new(Some(project), format);
    let runner = SystemRunner::new(config.tool_timeout);

    run_publish(&host, &runner, &config)
        .await
        .context("Publish failed")?;

    Ok(())
}
