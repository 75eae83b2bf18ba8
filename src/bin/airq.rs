use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use airq_monitor::app::App;
use airq_monitor::config::{Config, ConfigLoader, Settings};
use airq_monitor::domain::StationId;
use airq_monitor::error::AirqError;
use airq_monitor::fetch::GiosHttpClient;
use airq_monitor::output::{JsonOutput, OutputMode};
use airq_monitor::store::DocumentStore;
use airq_monitor::tui::Tui;
use airq_monitor::worker::{self, AdmissionPolicy, Delivery};

#[derive(Parser)]
#[command(name = "airq")]
#[command(about = "Browse GIOS air quality stations and fetch sensor reports")]
#[command(version)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct SettingsArgs {
    /// Path to a JSON config file (default: ./airq.json if present)
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[arg(long, global = true)]
    base_url: Option<String>,

    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[arg(long, global = true)]
    admission: Option<AdmissionPolicy>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download the station list and print it")]
    Stations,
    #[command(about = "Reload every station's sensors from the stored station list")]
    Sensors,
    #[command(about = "Fetch the measurement report for one station")]
    Report(ReportArgs),
}

#[derive(Args)]
struct ReportArgs {
    station: StationId,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<AirqError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &AirqError) -> u8 {
    match error {
        AirqError::NotFound(_) | AirqError::UnknownStation(_) => 2,
        err if err.is_network() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let settings = resolve_settings(&cli.settings)?;
    let store = DocumentStore::new(settings.data_dir.clone());
    store.ensure_root()?;

    let interactive = cli.command.is_none() && matches!(output_mode, OutputMode::Interactive);
    init_tracing(&store, interactive)?;

    let client = GiosHttpClient::new(settings.base_url.clone())?;
    let app = App::new(store, client, settings.timeout);

    match cli.command {
        Some(Commands::Stations) => {
            let result = app.load_catalog(&JsonOutput)?;
            JsonOutput::print_catalog(&result).into_diagnostic()
        }
        Some(Commands::Sensors) => {
            let result = match app.reload_with_sensors(&JsonOutput) {
                Err(AirqError::NotFound(path)) => {
                    tracing::info!(%path, "no stored station list, downloading");
                    app.load_catalog(&JsonOutput)?;
                    app.reload_with_sensors(&JsonOutput)
                }
                other => other,
            }?;
            JsonOutput::print_reload(&result).into_diagnostic()
        }
        Some(Commands::Report(args)) => run_report(app, args.station, settings.admission),
        None => {
            if !interactive {
                return Err(miette::Report::msg(
                    "command required (try `airq --help`)",
                ));
            }
            let mut tui = Tui::new();
            let progress = tui.progress();
            if let Err(err) = app.load_catalog(&progress) {
                tui.show(format!("Failed to load stations: {err}"));
            } else {
                tui.show("Select a station and press Enter.");
            }
            let (dispatcher, inbox) =
                worker::bridge(Arc::new(app), Arc::new(progress), settings.admission);
            tui.run(dispatcher, inbox)
        }
    }
}

fn run_report(
    app: App<GiosHttpClient>,
    station: StationId,
    admission: AdmissionPolicy,
) -> miette::Result<()> {
    app.load_catalog(&JsonOutput)?;
    let (dispatcher, inbox) = worker::bridge(Arc::new(app), Arc::new(JsonOutput), admission);
    let handle = dispatcher.request(station)?;
    drop(dispatcher);
    let Some(delivery) = inbox.recv() else {
        handle.join()?;
        return Err(miette::Report::msg("worker exited without delivering"));
    };
    handle.join()?;
    match delivery {
        Delivery::Report { .. } => JsonOutput::print_delivery(&delivery).into_diagnostic(),
        Delivery::Failed { message, .. } => Err(miette::Report::msg(message)),
    }
}

fn resolve_settings(args: &SettingsArgs) -> miette::Result<Settings> {
    let file = ConfigLoader::load(args.config.as_deref())?;
    let flags = Config {
        base_url: args.base_url.clone(),
        timeout_secs: args.timeout_secs,
        data_dir: args.data_dir.clone(),
        admission: args.admission,
    };
    Ok(ConfigLoader::resolve_config(file.overlay(flags))?)
}

fn init_tracing(store: &DocumentStore, interactive: bool) -> miette::Result<()> {
    let filter = EnvFilter::from_default_env();
    if interactive {
        let log_path = store.root().join("airq.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path.as_std_path())
            .into_diagnostic()?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}
