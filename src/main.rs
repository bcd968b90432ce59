use clap::Parser;
use log::error;

use wcd::cli::{run, Args};

fn main() {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .format_target(false)
        .format_timestamp_secs()
        .init();

    if let Err(e) = run(args) {
        error!("{e}");
        std::process::exit(1);
    }
}
