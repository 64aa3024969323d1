use anyhow::{bail, Context, Result};
use arbor_core::{
    ArborConfig, DocumentPipeline, HttpPublisher, MemoryTreeCache, PipelineOutput, SourceDocument,
};
use arbor_oracle::{CachedOracle, HttpOracle, Oracle};
use arbor_tree::WireTree;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn cli() -> Command {
    Command::new("arbor")
        .version(arbor_core::VERSION)
        .about("Reconstruct and annotate document trees")
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("build")
                .about("Build annotated trees from flat documents")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .short('i')
                        .required(true)
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(PathBuf))
                        .help("Source document JSON (repeatable)"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Output file, or directory when several inputs are given"),
                )
                .arg(
                    Arg::new("publish")
                        .long("publish")
                        .action(ArgAction::SetTrue)
                        .help("Send finished trees to the viewer service"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Check a serialized tree for structural consistency")
                .arg(
                    Arg::new("tree")
                        .long("tree")
                        .short('t')
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Wire tree JSON"),
                ),
        )
}

/// Logs go to stderr so stdout stays clean for tree output
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ArborConfig> {
    match path {
        Some(path) => Ok(ArborConfig::load(path)?),
        None => {
            let config = ArborConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn oracle(config: &ArborConfig) -> Result<Arc<dyn Oracle>> {
    let http = HttpOracle::new(config.oracle.http_config()?)?;
    let capacity = config.oracle.cache_capacity;
    Ok(if capacity > 0 {
        Arc::new(CachedOracle::new(http, capacity))
    } else {
        Arc::new(http)
    })
}

/// Where the tree of `input` is written; `None` means stdout
fn output_path(output: Option<&PathBuf>, input: &Path, several: bool) -> Option<PathBuf> {
    let output = output?;
    if !several {
        return Some(output.clone());
    }
    let stem = input
        .file_stem()
        .map_or_else(|| "document".into(), |s| s.to_string_lossy().into_owned());
    Some(output.join(format!("{stem}.tree.json")))
}

fn write_tree(output: &PipelineOutput, path: Option<&Path>) -> Result<()> {
    let json = output.tree.to_json()?;
    match path {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating {}", dir.display()))?;
            }
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), nodes = output.tree.len(), "tree written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn build(args: &ArgMatches) -> Result<()> {
    let config = load_config(args.get_one::<PathBuf>("config"))?;
    let inputs: Vec<&PathBuf> = args.get_many::<PathBuf>("input").into_iter().flatten().collect();
    let output = args.get_one::<PathBuf>("output");
    let several = inputs.len() > 1;
    if several && output.is_none() {
        bail!("--output must name a directory when several inputs are given");
    }

    let mut pipeline = DocumentPipeline::new(oracle(&config)?, config.clone());
    if config.tree_cache_capacity > 0 {
        pipeline = pipeline.with_cache(Arc::new(MemoryTreeCache::new(config.tree_cache_capacity)));
    }
    let publisher = if args.get_flag("publish") {
        Some(
            HttpPublisher::new(
                &config.transport.host,
                Duration::from_secs(config.oracle.timeout_secs),
            )?
            .with_token(config.transport.token()),
        )
    } else {
        None
    };

    for input in inputs {
        let source = std::fs::read_to_string(input)
            .with_context(|| format!("reading {}", input.display()))?;
        let document = SourceDocument::from_json(&source)
            .with_context(|| format!("parsing {}", input.display()))?;

        let result = pipeline
            .run(&document)
            .await
            .with_context(|| format!("building {}", input.display()))?;
        if let Some(stats) = &result.stats {
            tracing::info!(
                input = %input.display(),
                oracle_calls = stats.reconstruct.oracle_calls,
                rounds = stats.evaluation.rounds,
                recovered = stats.evaluation.recovered.len(),
                "document built"
            );
        }
        write_tree(&result, output_path(output, input, several).as_deref())?;

        if let Some(publisher) = &publisher {
            let tree_id = pipeline.publish(&result, publisher).await?;
            eprintln!("{}: published as {tree_id}", input.display());
        }
    }
    Ok(())
}

fn validate(args: &ArgMatches) -> Result<()> {
    let Some(path) = args.get_one::<PathBuf>("tree") else {
        bail!("--tree is required");
    };
    let json =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let tree = WireTree::from_json(&json)?;
    tree.validate()?;
    let report = serde_json::json!({
        "valid": true,
        "nodes": tree.len(),
        "root": tree.root_id(),
    });
    println!("{report}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("build", args)) => build(args).await,
        Some(("validate", args)) => validate(args),
        _ => {
            cli().print_help()?;
            std::process::exit(2);
        }
    }
}
