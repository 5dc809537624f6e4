#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use clap::Parser;
use codespaces_ssh::cli::{self, Cli};
use codespaces_ssh::logging;
use dotenv::dotenv;

#[tokio::main]
async fn main() {
    dotenv().ok();

    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let code = cli::dispatch(cli).await;

    // The stdin reader may still be parked in a blocking read, which would
    // hold up runtime shutdown until the next keypress.
    std::process::exit(code);
}
