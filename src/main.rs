use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use bibletui::app::App;
use bibletui::args::Options;
use clap::Parser;
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;
    let options = Options::parse();
    init_tracing(options.log_file.as_deref())?;

    let mut app = App::new(options)?;
    let terminal = ratatui::init();
    let result = app.run(terminal);

    ratatui::restore();
    result
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let Some(path) = log_file else { return Ok(()) };
    let file = File::create(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
