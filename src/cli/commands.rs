//! CLI command definitions for subject-pool.
//!
//! Every command builds a [`ServerContext`] over a [`FileAdapter`], runs
//! against it and prints JSON to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use crate::adapter::FileAdapter;
use crate::config::SamplerConfig;
use crate::engine::ServerContext;
use crate::metrics::{export_metrics, init_metrics};
use crate::sets::{Sample, SubjectId, UserId};

/// Serve unseen-subject samples from a fixture file.
#[derive(Parser)]
#[command(name = "subject-pool")]
#[command(about = "Sample unseen subjects per user from project pools")]
#[command(version)]
#[command(
    long_about = "subject-pool loads project pools from a JSON or YAML fixture and samples subjects a user has not seen yet.\n\nExample usage:\n  subject-pool sample --data projects.yaml --workflow galaxies --user 7 --limit 5"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Print the status of one workflow or of every project.
    Status(StatusArgs),

    /// Sample subjects from a workflow.
    Sample(SampleArgs),

    /// Report whether every project loaded successfully.
    ///
    /// Exits with an error when any workflow is not ready.
    Ready(SourceArgs),
}

/// Arguments shared by every command.
#[derive(clap::Args, Debug)]
pub struct SourceArgs {
    /// JSON or YAML fixture with projects, subjects and seen history.
    #[arg(short, long, env = "SUBJECT_POOL_DATA")]
    pub data: PathBuf,

    /// Print Prometheus metrics after the command output.
    #[arg(long)]
    pub metrics: bool,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Only report this workflow.
    #[arg(short, long)]
    pub workflow: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct SampleArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Workflow (project name) to sample from.
    #[arg(short, long)]
    pub workflow: String,

    /// User to sample for; omitted samples the whole pool.
    #[arg(short, long)]
    pub user: Option<UserId>,

    /// Number of subjects (pairs for pairwise workflows).
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Subject ids to mark as seen before sampling (comma separated).
    #[arg(long, value_delimiter = ',', requires = "user")]
    pub seen: Vec<SubjectId>,
}

#[derive(Debug, Serialize)]
struct SampleOutput<'a> {
    workflow: &'a str,
    user: Option<UserId>,
    subjects: Sample,
}

#[derive(Debug, Serialize)]
struct ReadyOutput {
    ready: bool,
    workflows: usize,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse CLI arguments and run the selected command.
///
/// Use `parse_cli()` and `run_with_cli()` to initialize logging in between.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Status(args) => run_status_command(args).await,
        Commands::Sample(args) => run_sample_command(args).await,
        Commands::Ready(args) => run_ready_command(args).await,
    }
}

fn build_context(source: &SourceArgs) -> anyhow::Result<ServerContext> {
    if source.metrics {
        init_metrics().context("Failed to initialize metrics")?;
    }

    let config = SamplerConfig::from_env().context("Invalid sampler configuration")?;

    let adapter = Arc::new(FileAdapter::new(source.data.clone()));
    info!(data = %source.data.display(), "Using fixture data");
    Ok(ServerContext::new(config, adapter))
}

async fn run_status_command(args: StatusArgs) -> anyhow::Result<()> {
    let context = build_context(&args.source)?;

    let output = match &args.workflow {
        Some(name) => {
            let status = context
                .status(name)
                .await
                .with_context(|| format!("Failed to load workflow '{}'", name))?;
            serde_json::to_string_pretty(&status)?
        }
        None => {
            load_all(&context).await?;
            serde_json::to_string_pretty(&context.statuses())?
        }
    };
    println!("{}", output);

    finish(&context, &args.source).await;
    Ok(())
}

async fn run_sample_command(args: SampleArgs) -> anyhow::Result<()> {
    let context = build_context(&args.source)?;

    if let Some(user_id) = args.user {
        if !args.seen.is_empty() {
            context
                .add_seen(&args.workflow, user_id, args.seen.clone())
                .await
                .with_context(|| format!("Failed to mark subjects seen for user {}", user_id))?;
        }
    }

    let subjects = context
        .sample(&args.workflow, args.user, args.limit)
        .await
        .with_context(|| format!("Failed to sample workflow '{}'", args.workflow))?;

    let output = SampleOutput {
        workflow: &args.workflow,
        user: args.user,
        subjects,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    finish(&context, &args.source).await;
    Ok(())
}

async fn run_ready_command(args: SourceArgs) -> anyhow::Result<()> {
    let context = build_context(&args)?;
    load_all(&context).await?;

    let output = ReadyOutput {
        ready: context.ready(),
        workflows: context.registry().len(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    finish(&context, &args).await;
    if !output.ready {
        anyhow::bail!("Not every workflow is ready");
    }
    Ok(())
}

async fn load_all(context: &ServerContext) -> anyhow::Result<()> {
    let failures = context
        .load_projects()
        .await
        .context("Failed to list projects")?;
    for (name, err) in &failures {
        warn!(workflow = %name, error = %err, "Project failed to load");
    }
    Ok(())
}

async fn finish(context: &ServerContext, source: &SourceArgs) {
    if source.metrics {
        context.ready();
        print!("{}", export_metrics());
    }
    context.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sample_command_defaults() {
        let cli = Cli::try_parse_from([
            "subject-pool",
            "sample",
            "--data",
            "projects.yaml",
            "--workflow",
            "galaxies",
        ])
        .expect("should parse");

        assert_eq!(cli.log_level, "info");
        match cli.command {
            Commands::Sample(args) => {
                assert_eq!(args.source.data, PathBuf::from("projects.yaml"));
                assert!(!args.source.metrics);
                assert_eq!(args.workflow, "galaxies");
                assert!(args.user.is_none());
                assert!(args.limit.is_none());
                assert!(args.seen.is_empty());
            }
            _ => panic!("Expected Sample command"),
        }
    }

    #[test]
    fn test_sample_command_with_all_options() {
        let cli = Cli::try_parse_from([
            "subject-pool",
            "sample",
            "-d",
            "projects.json",
            "-w",
            "penguins",
            "-u",
            "7",
            "-n",
            "3",
            "--seen",
            "1,2,3",
            "--metrics",
            "--log-level",
            "debug",
        ])
        .expect("should parse");

        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::Sample(args) => {
                assert_eq!(args.user, Some(7));
                assert_eq!(args.limit, Some(3));
                assert_eq!(args.seen, vec![1, 2, 3]);
                assert!(args.source.metrics);
            }
            _ => panic!("Expected Sample command"),
        }
    }

    #[test]
    fn test_seen_requires_user() {
        let result = Cli::try_parse_from([
            "subject-pool",
            "sample",
            "--data",
            "projects.yaml",
            "--workflow",
            "galaxies",
            "--seen",
            "1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_status_and_ready_commands() {
        let cli = Cli::try_parse_from(["subject-pool", "status", "--data", "p.yaml", "-w", "x"])
            .expect("should parse");
        match cli.command {
            Commands::Status(args) => assert_eq!(args.workflow.as_deref(), Some("x")),
            _ => panic!("Expected Status command"),
        }

        let cli = Cli::try_parse_from(["subject-pool", "ready", "--data", "p.yaml"])
            .expect("should parse");
        assert!(matches!(cli.command, Commands::Ready(_)));
    }

    #[test]
    fn test_data_is_required() {
        assert!(Cli::try_parse_from(["subject-pool", "ready"]).is_err());
    }
}
