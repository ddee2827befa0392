use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_geo_pipeline::config::{ConfigLoader, ConfigOverrides, PipelineConfig};
use kira_geo_pipeline::domain::{EmptyManifestPolicy, StageKind};
use kira_geo_pipeline::engine::Engine;
use kira_geo_pipeline::error::KiraError;
use kira_geo_pipeline::geo::GeoHttpClient;
use kira_geo_pipeline::output::{JsonOutput, OutputMode, SummaryOutput};

#[derive(Parser)]
#[command(name = "kira-gp")]
#[command(about = "Resumable GEO series pipeline: download, unpack, tabulate, reduce, clean up")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(flatten)]
    dataset: DatasetArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone)]
struct DatasetArgs {
    /// Directory holding the archive, the extracted tree and readme.txt [default: data]
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// GEO series group, e.g. GSE68nnn [default: derived from the dataset name]
    #[arg(long, global = true)]
    dataset_series: Option<String>,

    /// GEO series accession [default: GSE68849]
    #[arg(long, global = true)]
    dataset_name: Option<String>,

    /// JSON config file; command-line flags override its values
    #[arg(long, global = true)]
    config: Option<String>,

    /// Whether a manifest with no entries counts as a finished stage [default: reject]
    #[arg(long, global = true)]
    empty_manifest: Option<EmptyManifestPolicy>,

    /// Limit on the whole archive download, in seconds [default: none]
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the pipeline up to a target stage (default: cleanup)")]
    Run(RunArgs),
    #[command(about = "Show which stages are complete without running anything")]
    Status,
}

#[derive(Args, Clone)]
struct RunArgs {
    #[arg(long, value_enum, default_value_t = StageKind::Cleanup)]
    target: StageKind,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error.root() {
        KiraError::InvalidAccession(_) | KiraError::ConfigRead(_) | KiraError::ConfigParse(_) => 2,
        KiraError::Transfer(_) | KiraError::TransferStatus { .. } => 3,
        KiraError::Archive(_)
        | KiraError::Decompress(_)
        | KiraError::Format(_)
        | KiraError::Schema(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = resolve_config(cli.dataset)?;
    let geo = GeoHttpClient::new(config.timeout_secs.map(Duration::from_secs))?;
    let engine = Engine::new(config, geo);

    match cli.command.unwrap_or(Commands::Run(RunArgs {
        target: StageKind::Cleanup,
    })) {
        Commands::Run(args) => run_pipeline(&engine, args.target, output_mode),
        Commands::Status => run_status(&engine, output_mode),
    }
}

fn resolve_config(args: DatasetArgs) -> Result<PipelineConfig, KiraError> {
    let DatasetArgs {
        data_dir,
        dataset_series,
        dataset_name,
        config,
        empty_manifest,
        timeout_secs,
    } = args;
    let overrides = ConfigOverrides {
        data_dir,
        dataset_series,
        dataset_name,
        empty_manifest,
        timeout_secs,
    };
    ConfigLoader::resolve(config.as_deref(), overrides)
}

fn run_pipeline(
    engine: &Engine<GeoHttpClient>,
    target: StageKind,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => {
            let result = engine.run(target, &JsonOutput)?;
            JsonOutput::print_run(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = engine.run(target, &SummaryOutput)?;
            SummaryOutput::print_run(&result);
        }
    }
    Ok(())
}

fn run_status(engine: &Engine<GeoHttpClient>, output_mode: OutputMode) -> miette::Result<()> {
    let result = engine.status();
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_status(&result).into_diagnostic()?,
        OutputMode::Interactive => SummaryOutput::print_status(&result),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_target_and_dataset() {
        let cli = Cli::try_parse_from([
            "kira-gp",
            "run",
            "--target",
            "reduce-probes",
            "--dataset-name",
            "GSE1000",
        ])
        .unwrap();
        assert_eq!(cli.dataset.dataset_name.as_deref(), Some("GSE1000"));
        match cli.command {
            Some(Commands::Run(args)) => assert_eq!(args.target, StageKind::ReduceProbes),
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn exit_codes_follow_root_cause() {
        let err = KiraError::TransferStatus {
            status: 404,
            message: "not found".to_string(),
        }
        .in_stage(StageKind::Download);
        assert_eq!(map_exit_code(&err), 3);

        let err = KiraError::Schema("Synonyms".to_string()).in_stage(StageKind::ReduceProbes);
        assert_eq!(map_exit_code(&err), 4);
    }
}
