use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use h5zarr::app::{App, BatchSummary, ProgressEvent, ProgressSink};
use h5zarr::config::{ConfigLoader, ConfigOverrides};
use h5zarr::domain::ConversionOutcome;
use h5zarr::error::ConvertError;
use h5zarr::fs_util::discover_inputs;
use h5zarr::h5::Hdf5Reader;
use h5zarr::output::{JsonOutput, OutputMode};
use h5zarr::store::ensure_dir;
use h5zarr::zarr::ZarrZipWriter;

#[derive(Parser)]
#[command(name = "h5zarr")]
#[command(about = "Convert HDF5 time series into chunked, compressed Zarr zip stores")]
#[command(version, author)]
struct Cli {
    /// Directory searched recursively for *.h5 files
    data_dir: Option<Utf8PathBuf>,

    /// Directory receiving all artifacts; defaults to beside each input
    output_dir: Option<Utf8PathBuf>,

    /// Number of files converted in parallel
    #[arg(short, long)]
    workers: Option<usize>,

    /// Replace artifacts that already exist
    #[arg(long)]
    overwrite: bool,

    /// JSON config file (default: ./h5zarr.json if present)
    #[arg(long)]
    config: Option<String>,

    /// Print the batch summary as JSON instead of showing progress
    #[arg(long)]
    non_interactive: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<ConvertError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ConvertError) -> u8 {
    if error.is_config_error() { 2 } else { 1 }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
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

    let overrides = ConfigOverrides {
        data_dir: cli.data_dir,
        output_dir: cli.output_dir,
        workers: cli.workers,
        overwrite: cli.overwrite,
    };
    let config = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;

    let inputs = discover_inputs(&config.data_dir)?;
    if let Some(output_dir) = &config.output_dir {
        ensure_dir(output_dir)?;
    }

    let app = App::new(Hdf5Reader::new(), ZarrZipWriter::new());
    match output_mode {
        OutputMode::Interactive => {
            let sink = BarSink::new(inputs.len() as u64);
            let summary = app.convert_all(inputs, &config, &sink)?;
            sink.finish();
            print_summary(&summary);
        }
        OutputMode::NonInteractive => {
            let summary = app.convert_all(inputs, &config, &JsonOutput)?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
        }
    }
    Ok(())
}

struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
        bar.set_style(style);
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarSink {
    fn event(&self, event: ProgressEvent) {
        if let ConversionOutcome::Failed { input, message } = &event.outcome {
            self.bar.println(format!("\x1b[31mfailed\x1b[0m {input}: {message}"));
        }
        self.bar.set_message(event.outcome.input().file_name().unwrap_or_default().to_string());
        self.bar.set_position(event.completed as u64);
    }
}

fn print_summary(summary: &BatchSummary) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!("{cyan}h5zarr summary ({} files){reset}", summary.total);
    println!("{green}converted: {}{reset}", summary.succeeded);
    println!("{yellow}skipped:   {}{reset}", summary.skipped);
    println!("{red}failed:    {}{reset}", summary.failed.len());
    for failure in &summary.failed {
        println!("{red}  {} ({}){reset}", failure.input, failure.message);
    }
}
