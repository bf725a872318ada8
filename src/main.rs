use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod dataset;
mod domain;
mod export;
mod inputter;
mod interpreter;
mod layout;
mod model;
mod storage;
mod ui;
mod view;
mod viewport;

use controller::Controller;
use dataset::Datasets;
use domain::{ViewerConfig, ViewerError};
use export::expand_path;
use model::{Model, Status};
use storage::FileStorage;
use ui::TableUI;

/// Mock SQL query viewer for the terminal.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Query shown in the editor at startup
    #[arg(short, long)]
    query: Option<String>,

    /// File keeping theme, history and bookmarks
    #[arg(long, default_value = "~/.sqlview_state.json")]
    state_file: PathBuf,

    /// Target of the csv export
    #[arg(short, long, default_value = export::DEFAULT_EXPORT_FILE)]
    export_path: PathBuf,

    /// Initial rows per page, one of 5, 10, 20, 50, 100
    #[arg(short, long, default_value_t = 10)]
    page_size: usize,

    /// Upper bound of the simulated query latency
    #[arg(long, default_value_t = 1000)]
    max_delay_ms: u64,

    /// Log file, the level is controlled by RUST_LOG
    #[arg(long, default_value = "~/.sqlview.log")]
    log_file: PathBuf,

    /// Event poll timeout
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
}

impl Args {
    fn config(&self) -> ViewerConfig {
        ViewerConfig::default()
            .with_initial_query(self.query.clone())
            .with_state_file(expand_path(&self.state_file))
            .with_export_path(self.export_path.clone())
            .with_page_size(self.page_size)
            .with_max_delay_ms(self.max_delay_ms)
            .with_event_poll_time(self.poll_ms)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&expand_path(&args.log_file)) {
        eprintln!("Error: could not open log file: {e}");
        return ExitCode::FAILURE;
    }

    match run(args.config()) {
        Err(e) => {
            error!("Exiting with error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(path: &Path) -> Result<(), ViewerError> {
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| ViewerError::LoadingFailed(e.to_string()))
}

fn run(cfg: ViewerConfig) -> Result<(), ViewerError> {
    info!("Starting sqlview {}", env!("CARGO_PKG_VERSION"));

    let datasets = Datasets::load()?;
    let storage = FileStorage::open(cfg.state_file.clone())?;

    let ui = TableUI::new(&cfg);
    let controller = Controller::new(&cfg);

    // The terminal is restored on every exit path once it was initialized
    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &cfg, datasets, storage, &ui, &controller);
    ratatui::restore();
    result?;

    info!("Bye");
    Ok(())
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    cfg: &ViewerConfig,
    datasets: Arc<Datasets>,
    storage: FileStorage,
    ui: &TableUI,
    controller: &Controller,
) -> Result<(), ViewerError> {
    let size = terminal.size()?;
    let mut model = Model::init(
        cfg,
        datasets,
        Box::new(storage),
        size.width as usize,
        size.height as usize,
    )?;

    while model.status != Status::Quitting {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message, None keeps polling a running query
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }
    Ok(())
}
