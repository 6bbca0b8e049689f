use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use ratatui::DefaultTerminal;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod columns;
mod controller;
mod domain;
mod fetcher;
mod inputter;
mod model;
mod pagination;
mod transform;
mod ui;
mod worker;

use controller::Controller;
use domain::{Message, TVConfig, TVError};
use fetcher::HttpSource;
use model::{Model, Status};
use ui::TableUI;
use worker::FetchWorker;

/// Browse a paginated JSON collection endpoint as a table.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Collection endpoint, pages are requested with `_page` and `_limit`
    endpoint: Option<String>,

    /// Table title
    #[arg(short, long)]
    title: Option<String>,

    /// Records per page
    #[arg(short = 'n', long)]
    page_size: Option<usize>,

    /// JSON config file, command line arguments take precedence
    #[arg(short, long)]
    config: Option<String>,

    /// Where to write the log, filtered with RUST_LOG
    #[arg(long, default_value = "jtv.log")]
    log_file: String,

    /// Input poll interval in ms
    #[arg(long)]
    event_poll_time: Option<u64>,

    /// Page request timeout in ms
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long)]
    no_filter: bool,

    #[arg(long)]
    no_search: bool,

    #[arg(long)]
    no_sort: bool,

    #[arg(long)]
    no_pagination: bool,

    #[arg(long)]
    no_column_toggle: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn build_config(args: &Args) -> Result<TVConfig, TVError> {
    let mut config = match &args.config {
        Some(path) => {
            let path = shellexpand::full(path)
                .map_err(|e| TVError::InvalidConfig(format!("config path: {e}")))?;
            TVConfig::from_file(Path::new(&*path))?
        }
        None => TVConfig::default(),
    };

    if let Some(endpoint) = &args.endpoint {
        config = config.endpoint(endpoint.clone());
    }
    if let Some(title) = &args.title {
        config = config.title(title.clone());
    }
    if let Some(page_size) = args.page_size {
        config = config.page_size(page_size);
    }
    if let Some(event_poll_time) = args.event_poll_time {
        config = config.event_poll_time(event_poll_time);
    }
    if let Some(timeout) = args.timeout {
        config = config.request_timeout(timeout);
    }

    // Flags can only switch capabilities off.
    let caps = config.capabilities;
    config.capabilities = caps
        .with_filter(caps.filter && !args.no_filter)
        .with_search(caps.search && !args.no_search)
        .with_sort(caps.sort && !args.no_sort)
        .with_pagination(caps.pagination && !args.no_pagination)
        .with_column_toggle(caps.column_toggle && !args.no_column_toggle);

    config.validate()?;
    Ok(config)
}

fn init_logging(log_file: &str) -> Result<(), TVError> {
    let path = shellexpand::tilde(log_file).into_owned();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(args: Args) -> Result<(), TVError> {
    let config = build_config(&args)?;
    init_logging(&args.log_file)?;
    info!("Starting jtv on {}", config.endpoint);

    let runtime = tokio::runtime::Runtime::new()?;
    let source = Arc::new(
        HttpSource::new(config.endpoint.clone())
            .with_timeout(Duration::from_millis(config.request_timeout)),
    );
    let (worker, results) = FetchWorker::new(runtime.handle().clone(), source);

    let mut model = Model::init(&config);
    let ui = TableUI::new(&config);
    let controller = Controller::new(&config);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut model, &ui, &controller, &worker, results);
    ratatui::restore();
    info!("Quitting jtv");
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    ui: &TableUI,
    controller: &Controller,
    worker: &FetchWorker,
    mut results: UnboundedReceiver<Message>,
) -> Result<(), TVError> {
    if let Some(command) = model.update(Message::Mount) {
        worker.dispatch(command);
    }

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

        if let Some(message) = controller.handle_event(model)?
            && let Some(command) = model.update(message)
        {
            worker.dispatch(command);
        }

        // Fetch results are applied on this thread only.
        while let Ok(message) = results.try_recv() {
            if let Some(command) = model.update(message) {
                worker.dispatch(command);
            }
        }
    }
    Ok(())
}
