use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use ria_content::ContentDigest;
use ria_core::{AnalysisReport, Config, ReportPipeline, TaskGraph, TaskRegistry};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("ria")
        .version(ria_core::VERSION)
        .about("Risk Insight Analyzer: cached extraction and fan-out report analysis")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("analyze")
                .about("Run the full pipeline on a document and print the report")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Document to analyze"),
                )
                .arg(
                    Arg::new("pretty")
                        .long("pretty")
                        .action(ArgAction::SetTrue)
                        .help("Pretty-print the report"),
                ),
        )
        .subcommand(
            Command::new("digest")
                .about("Print the content digest of a file")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("File to hash"),
                ),
        )
        .subcommand(Command::new("tasks").about("List analysis tasks and their result keys"))
        .subcommand(Command::new("schema").about("Print the report JSON Schema"))
        .subcommand(Command::new("config").about("Print the effective configuration"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<Config> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn file_arg<'a>(args: &'a ArgMatches) -> anyhow::Result<&'a Path> {
    args.get_one::<PathBuf>("file")
        .map(PathBuf::as_path)
        .context("missing FILE argument")
}

async fn analyze(config: &Config, path: &Path, pretty: bool) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .context("file name is not valid UTF-8")?;

    let pipeline = ReportPipeline::from_config(config)?;
    match pipeline.analyze(&bytes, filename).await {
        Ok(outcome) => {
            tracing::info!(
                digest = %outcome.digest.short(),
                text_source = ?outcome.text_source,
                "analysis finished"
            );
            let rendered = if pretty {
                serde_json::to_string_pretty(&outcome.report)?
            } else {
                serde_json::to_string(&outcome.report)?
            };
            println!("{rendered}");
            Ok(())
        }
        Err(err) => {
            tracing::error!(kind = ?err.kind(), status = err.status_code(), "analysis failed");
            Err(err.into())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    let (name, args) = matches.subcommand().context("missing subcommand")?;
    init_tracing(args.get_flag("log-json"));
    let config = load_config(args)?;

    match (name, args) {
        ("analyze", args) => {
            analyze(&config, file_arg(args)?, args.get_flag("pretty")).await?;
        }
        ("digest", args) => {
            let path = file_arg(args)?;
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            println!("{}  {}", ContentDigest::compute(&bytes), path.display());
        }
        ("tasks", _) => {
            let registry = TaskRegistry::standard();
            let graph = TaskGraph::standard(&registry)?;
            println!("entry: {}", graph.entry());
            for task in registry.tasks() {
                println!("  {:<26} -> {}", task.name(), task.result_key());
            }
        }
        ("schema", _) => {
            let schema = AnalysisReport::json_schema()?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        ("config", _) => {
            print!("{}", config.to_toml_string()?);
        }
        (other, _) => anyhow::bail!("unknown subcommand {other}"),
    }

    Ok(())
}
