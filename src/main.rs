mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use frontdesk::config;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = config::Settings::from_env();
    if let Err(e) = cli::Cli::parse().run(&settings) {
        tracing::error!(error = %e, "Command failed");
        std::process::exit(1);
    }
}
