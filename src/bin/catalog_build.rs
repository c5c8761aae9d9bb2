use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use pangenome_catalog::app::{App, ProgressSink};
use pangenome_catalog::catalog::Entity;
use pangenome_catalog::config::{ConfigLoader, ResolvedConfig};
use pangenome_catalog::enrich::HttpSizeProbe;
use pangenome_catalog::error::CatalogError;
use pangenome_catalog::fetch::HttpFetcher;
use pangenome_catalog::output::{ConsoleOutput, JsonOutput, OutputMode};
use pangenome_catalog::validate::ValidationPolicy;

#[derive(Parser, Debug)]
#[command(name = "catalog-build")]
#[command(about = "Build the pangenome data catalog tables from release index files")]
#[command(version, author)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Config file (default: ./catalog-build.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    output_dir: Option<Utf8PathBuf>,

    /// Also save every downloaded source file here
    #[arg(long, global = true)]
    downloads_dir: Option<Utf8PathBuf>,

    #[arg(long, global = true, value_enum)]
    validation_policy: Option<ValidationPolicy>,

    /// Write `N/A` file sizes instead of probing each file
    #[arg(long, global = true)]
    skip_file_sizes: bool,

    /// Print the build summary as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Build assemblies.csv")]
    Assemblies,
    #[command(about = "Build annotations.csv")]
    Annotations,
    #[command(about = "Build sequencing-data.csv")]
    SequencingData,
    #[command(about = "Derive naming columns and build alignments.csv")]
    Alignments(AlignmentsArgs),
    #[command(about = "Validate an existing alignments.csv")]
    ValidateAlignments(ValidateArgs),
    #[command(about = "Build every table")]
    All,
}

#[derive(Args, Debug)]
struct AlignmentsArgs {
    /// Source alignments table
    #[arg(long)]
    source: Option<Utf8PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Table to validate (default: <output-dir>/alignments.csv)
    path: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<CatalogError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CatalogError) -> u8 {
    match error {
        CatalogError::ValidationFailed { .. }
        | CatalogError::Configuration(_)
        | CatalogError::MissingSeparator(_)
        | CatalogError::ConfigRead(_)
        | CatalogError::ConfigParse(_) => 2,
        CatalogError::FetchHttp { .. } | CatalogError::FetchStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.global.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let mut config = ConfigLoader::resolve(cli.global.config.as_deref())?;
    apply_overrides(&mut config, &cli.global);
    if let Commands::Alignments(AlignmentsArgs {
        source: Some(source),
    }) = &cli.command
    {
        config.alignments_source = source.clone();
    }

    let fetcher = HttpFetcher::new(config.downloads_dir.clone())?;
    let probe = HttpSizeProbe::new(config.probe_timeout)?;
    let app = App::new(fetcher, probe, config);

    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Text => &ConsoleOutput,
    };

    match cli.command {
        Commands::Assemblies => run_build(&app, Entity::Assemblies, sink, output_mode),
        Commands::Annotations => run_build(&app, Entity::Annotations, sink, output_mode),
        Commands::SequencingData => run_build(&app, Entity::SequencingData, sink, output_mode),
        Commands::Alignments(_) => {
            let result = app.build_alignments(sink)?;
            if output_mode == OutputMode::Json {
                JsonOutput::print_build(&result).into_diagnostic()?;
            }
            Ok(())
        }
        Commands::ValidateAlignments(args) => {
            let result = app.validate_alignments(args.path, sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_validation(&result).into_diagnostic()?,
                OutputMode::Text if result.validation.report.is_none() => {
                    println!("No validation errors in {}", result.file)
                }
                OutputMode::Text => {}
            }
            Ok(())
        }
        Commands::All => {
            let report = app.build_all(sink)?;
            if output_mode == OutputMode::Json {
                JsonOutput::print_report(&report).into_diagnostic()?;
            }
            Ok(())
        }
    }
}

fn apply_overrides(config: &mut ResolvedConfig, args: &GlobalArgs) {
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(dir) = &args.downloads_dir {
        config.downloads_dir = Some(dir.clone());
    }
    if let Some(policy) = args.validation_policy {
        config.validation_policy = policy;
    }
    if args.skip_file_sizes {
        config.skip_file_sizes = true;
    }
}

fn run_build(
    app: &App<HttpFetcher, HttpSizeProbe>,
    entity: Entity,
    sink: &dyn ProgressSink,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let result = app.build(entity, sink)?;
    if output_mode == OutputMode::Json {
        JsonOutput::print_build(&result).into_diagnostic()?;
    }
    Ok(())
}
