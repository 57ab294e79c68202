use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kinan::app::{App, ProgressSink};
use kinan::config::{ConfigLoader, ResolvedConfig};
use kinan::error::KinanError;
use kinan::model::JsonModelWriter;
use kinan::notation::ResolverTables;
use kinan::output::{JsonOutput, OutputMode, TextOutput};
use kinan::source::JsonRecordSource;
use kinan::store::Store;
use kinan::unichem::UniChemHttpClient;
use kinan::xref::ResolveOptions;

#[derive(Parser)]
#[command(name = "kinan")]
#[command(about = "Annotated kinetic parameters from BRENDA, cross-referenced through UniChem")]
#[command(version, author)]
struct Cli {
    /// Config file; defaults to kinan.json in the working directory if present.
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    results_dir: Option<Utf8PathBuf>,

    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Extract and map parameters from the record source")]
    Extract(ExtractArgs),
    #[command(about = "Resolve chemical cross-references through UniChem")]
    Resolve(ResolveArgs),
    #[command(about = "Merge annotations and write the parameter model")]
    Emit,
    #[command(about = "Run extract, resolve and emit in order")]
    Run(RunArgs),
}

#[derive(Args, Clone, Default)]
struct ExtractArgs {
    #[arg(long)]
    source: Option<Utf8PathBuf>,
}

#[derive(Args, Clone, Default)]
struct ResolveArgs {
    #[arg(long)]
    notations: Option<Utf8PathBuf>,

    /// Ignore cached cross-references.
    #[arg(long)]
    force: bool,
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    #[command(flatten)]
    extract: ExtractArgs,

    #[command(flatten)]
    resolve: ResolveArgs,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kinan) = report.downcast_ref::<KinanError>() {
            return ExitCode::from(map_exit_code(kinan));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KinanError) -> u8 {
    match error {
        KinanError::MissingConfig
        | KinanError::MissingNotations
        | KinanError::MissingCheckpoint { .. } => 2,
        // Client construction can fail before any lookup runs.
        KinanError::UniChemHttp(_)
        | KinanError::UniChemStatus { .. }
        | KinanError::UniChemPayload(_)
        | KinanError::IncompleteResolution { .. } => 3,
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
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut config = ConfigLoader::resolve_or_default(cli.config.as_deref())?;
    if let Some(results_dir) = cli.results_dir {
        config.results_dir = results_dir;
    }

    let store = Store::new(config.results_dir.clone());
    let client = UniChemHttpClient::new(&config.unichem)?;
    let app = App::new(store, client, JsonModelWriter);

    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Interactive => &TextOutput,
        OutputMode::NonInteractive => &JsonOutput,
    };

    match cli.command {
        Commands::Extract(args) => {
            let source = open_source(&config, &args)?;
            let result = app.extract(&source, sink)?;
            let printed = match output_mode {
                OutputMode::Interactive => TextOutput::print_extract(&result),
                OutputMode::NonInteractive => JsonOutput::print_extract(&result),
            };
            printed.into_diagnostic()
        }
        Commands::Resolve(args) => {
            let tables = load_tables(&config, &args)?;
            let result = app.resolve(&tables, resolve_options(&args), sink)?;
            let printed = match output_mode {
                OutputMode::Interactive => TextOutput::print_resolve(&result),
                OutputMode::NonInteractive => JsonOutput::print_resolve(&result),
            };
            printed.into_diagnostic()?;
            Ok(result.ensure_complete()?)
        }
        Commands::Emit => {
            let result = app.emit(sink)?;
            let printed = match output_mode {
                OutputMode::Interactive => TextOutput::print_emit(&result),
                OutputMode::NonInteractive => JsonOutput::print_emit(&result),
            };
            printed.into_diagnostic()
        }
        Commands::Run(args) => {
            let source = open_source(&config, &args.extract)?;
            let tables = load_tables(&config, &args.resolve)?;
            let result = app.run(&source, &tables, resolve_options(&args.resolve), sink)?;
            let printed = match output_mode {
                OutputMode::Interactive => TextOutput::print_run(&result),
                OutputMode::NonInteractive => JsonOutput::print_run(&result),
            };
            printed.into_diagnostic()?;
            Ok(result.resolve.ensure_complete()?)
        }
    }
}

fn open_source(config: &ResolvedConfig, args: &ExtractArgs) -> miette::Result<JsonRecordSource> {
    let path = args
        .source
        .clone()
        .or_else(|| config.source.clone())
        .ok_or_else(|| miette::miette!("no record source given (use --source or `source` in kinan.json)"))?;
    Ok(JsonRecordSource::open(&path)?)
}

fn load_tables(config: &ResolvedConfig, args: &ResolveArgs) -> miette::Result<ResolverTables> {
    let notations = args.notations.clone().or_else(|| config.notations.clone());
    Ok(ResolverTables::load(notations.as_deref(), config.sources.clone())?)
}

fn resolve_options(args: &ResolveArgs) -> ResolveOptions {
    ResolveOptions { force: args.force }
}
