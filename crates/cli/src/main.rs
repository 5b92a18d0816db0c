use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sitegraph_graph::{
    load_and_build, run_build, BuildReport, GraphConfig, GraphError, SiteGraphBuild,
    WrittenArtifact,
};
use std::path::{Path, PathBuf};

/// Unsatisfied slugs listed in an error message before truncating
const MAX_LISTED_SLUGS: usize = 20;

#[derive(Parser)]
#[command(name = "sitegraph")]
#[command(about = "Build the recommendation / alternative / explore link graph of a catalog site", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the link graph and write neighbors, topics and inbound counts
    Build(BuildArgs),

    /// Build and validate the link graph without writing anything
    Check(CheckArgs),
}

#[derive(Args)]
struct InputArgs {
    /// Catalog JSON (array of item records)
    #[arg(long)]
    catalog: PathBuf,

    /// Delisted slugs (JSON array or one slug per line)
    #[arg(long)]
    gone: Option<PathBuf>,

    /// TOML configuration; missing keys keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output JSON summary on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct BuildArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Directory receiving the artifacts
    #[arg(long, default_value = "sitegraph-out")]
    out_dir: PathBuf,
}

#[derive(Args)]
struct CheckArgs {
    #[command(flatten)]
    input: InputArgs,
}

#[derive(Serialize)]
struct Summary<'a> {
    status: &'static str,
    command: &'static str,
    report: &'a BuildReport,
    #[serde(skip_serializing_if = "no_artifacts")]
    artifacts: &'a [WrittenArtifact],
}

fn no_artifacts(artifacts: &&[WrittenArtifact]) -> bool {
    artifacts.is_empty()
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Auto-enable quiet mode when --json is used (to keep stdout clean for JSON parsing)
    let json_output = match &cli.command {
        Commands::Build(args) => args.input.json,
        Commands::Check(args) => args.input.json,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Build(args) => run_build_command(args),
        Commands::Check(args) => run_check_command(args),
    }
}

fn run_build_command(args: BuildArgs) -> Result<()> {
    let config = load_config(args.input.config.as_deref())?;
    let (report, written) = run_build(
        &args.input.catalog,
        args.input.gone.as_deref(),
        &config,
        &args.out_dir,
    )
    .map_err(describe_failure)?;

    if args.input.json {
        print_summary("build", &report, &written)?;
    } else {
        print_report(&report);
        for artifact in &written {
            println!("{}  {}", artifact.sha256, artifact.path.display());
        }
    }
    Ok(())
}

fn run_check_command(args: CheckArgs) -> Result<()> {
    let config = load_config(args.input.config.as_deref())?;
    let SiteGraphBuild { report, .. } =
        load_and_build(&args.input.catalog, args.input.gone.as_deref(), &config)
            .map_err(describe_failure)?;

    if args.input.json {
        print_summary("check", &report, &[])?;
    } else {
        print_report(&report);
        println!("Invariant gate passed");
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<GraphConfig> {
    match path {
        Some(path) => GraphConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(GraphConfig::default()),
    }
}

/// Gate failures name the slugs that could not be satisfied
fn describe_failure(err: GraphError) -> anyhow::Error {
    let slugs = err.unsatisfied_slugs();
    if slugs.is_empty() {
        return anyhow::Error::new(err);
    }
    let mut listed = slugs
        .iter()
        .take(MAX_LISTED_SLUGS)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");
    if slugs.len() > MAX_LISTED_SLUGS {
        listed.push_str(&format!(" (+{} more)", slugs.len() - MAX_LISTED_SLUGS));
    }
    let context = format!("Unsatisfied slugs: {listed}");
    anyhow::Error::new(err).context(context)
}

fn print_summary(command: &'static str, report: &BuildReport, artifacts: &[WrittenArtifact]) -> Result<()> {
    let summary = Summary {
        status: "ok",
        command,
        report,
        artifacts,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn print_report(report: &BuildReport) {
    println!(
        "{} items: {} recommendations, {} alternatives, {} explore links",
        report.items, report.recommendation_links, report.alternative_links, report.explore_links
    );
    println!(
        "inbound {}..={}, rescue rounds {}, {} inserted, {} swapped",
        report.gate.min_inbound,
        report.gate.max_inbound,
        report.rescue.rounds,
        report.rescue.inserted,
        report.rescue.swapped
    );
    if report.gate.duplicate_signature_groups > 0 {
        println!(
            "warning: {} duplicated recommendation signatures (largest group {})",
            report.gate.duplicate_signature_groups, report.gate.largest_signature_group
        );
    }
}
