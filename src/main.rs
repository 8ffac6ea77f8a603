//! `grimoire` CLI entry point.

use clap::Parser;
use grimoire::cli::{dispatch, Cli};

#[tokio::main]
async fn main() {
    grimoire::observability::init_tracing();
    let cli = Cli::parse();
    let code = dispatch(cli).await;
    std::process::exit(code);
}
