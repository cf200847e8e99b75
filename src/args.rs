use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct Options {
    /// scripture.api.bible API key
    #[arg(long, env = "SCRIPTURE_API_KEY")]
    pub api_key: String,

    /// Write tracing output to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
