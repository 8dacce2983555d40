use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{ArgAction, Parser};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod domain;
mod filter;
mod inputter;
mod model;
mod scripts;
mod table;
mod ui;

use controller::Controller;
use domain::{SpvConfig, SpvError};
use model::{Model, Status};

/// A tui based SharePoint list viewer with cascading filters.
#[derive(Parser, Debug)]
#[command(name = "spv", version, about)]
struct Cli {
    /// Spreadsheet to display (xlsx, csv, parquet, arrow)
    #[arg(default_value = "DefaultView-Data.xlsx")]
    file: String,

    /// Worksheet name used for xlsx input
    #[arg(long, default_value = "DefaultView")]
    sheet: String,

    /// PowerShell script that refreshes the spreadsheet from SharePoint
    #[arg(long, default_value = "exportAllColumns.ps1")]
    refresh_script: String,

    /// PowerShell script that downloads attachments for a list of row ids
    #[arg(long, default_value = "downloadAttachments.ps1")]
    download_script: String,

    /// PowerShell interpreter used to run the scripts
    #[arg(long, default_value = "powershell.exe")]
    powershell: String,

    /// Append logs to this file (the terminal belongs to the UI)
    #[arg(long)]
    log_file: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

fn run(cli: Cli) -> Result<(), SpvError> {
    init_tracing(&cli)?;
    let config = build_config(&cli)?;
    info!("Starting spv with {:?}", config);

    let mut terminal = ratatui::init();
    let size = terminal.size()?;

    let mut model = Model::init(&config, size.width as usize, size.height as usize)?;
    model.load_if_present();

    let controller = Controller::new(&config);

    while model.status != Status::QUITTING {
        terminal.draw(|frame| ui::draw(&model, frame))?;

        // Handle events and map them to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<SpvConfig, SpvError> {
    Ok(SpvConfig::default()
        .with_data_path(expand(&cli.file)?)
        .with_sheet_name(cli.sheet.clone())
        .with_refresh_script(expand(&cli.refresh_script)?)
        .with_download_script(expand(&cli.download_script)?)
        .with_powershell_bin(cli.powershell.clone()))
}

fn expand(raw: &str) -> Result<PathBuf, SpvError> {
    let expanded = shellexpand::full(raw).map_err(|e| SpvError::InvalidPath(e.to_string()))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

fn init_tracing(cli: &Cli) -> Result<(), SpvError> {
    let Some(log_file) = &cli.log_file else {
        return Ok(());
    };
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(expand(log_file)?)?;

    let default_level = match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default())
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .init();
    Ok(())
}
