use clap::Parser;
use log::error;
use shmetro_scraper::{scrape_line_status, Options};
use std::env;
use std::process;

#[derive(Parser, Debug)]
#[clap(about = "Fetches Shanghai Metro line status through the site's script gate")]
pub struct CliArgs {
    /// Logging verbosity level (valid values: off, error, warn, info, debug, trace)
    #[clap(short, long, value_name = "LEVEL", default_value = "info")]
    verbosity: log::LevelFilter,

    #[clap(flatten)]
    options: Options,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenv::dotenv().ok();
    let cli_args = CliArgs::parse();
    if env::var(env_logger::DEFAULT_FILTER_ENV).is_ok() {
        env_logger::init();
    } else {
        env_logger::builder()
            .filter(Some(env!("CARGO_PKG_NAME")), cli_args.verbosity)
            .format_timestamp(None)
            .format_target(false)
            .init();
    }
    if let Err(failure) = scrape_line_status(&cli_args.options).await {
        error!("{:?}", failure.error);
        process::exit(failure.exit_code());
    }
}
