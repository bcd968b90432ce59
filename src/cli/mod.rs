//! The `wcd` command line interface
use crate::config::DecoderConfig;
use crate::error::Result;
use clap::Parser;
use log::LevelFilter;
use std::io::{stdout, BufWriter, Write};
use std::path::PathBuf;

/// Convert and inspect multibeam water column data
#[derive(Parser, Debug)]
#[command(name = "wcd", version, long_about = None)]
pub struct Args {
    /// More log output, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
    /// The subcommand
    #[command(subcommand)]
    pub cmd: Action,
}

impl Args {
    /// The log level selected by `-v` and `-q`
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// The subcommands
#[derive(clap::Subcommand, Debug)]
pub enum Action {
    /// Identify the sonar behind vendor files
    Analyze {
        /// Vendor files to inspect
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Convert a vendor file to the Generic Water Column Format
    Convert {
        /// Vendor file
        input: PathBuf,
        /// GWF file to create
        output: PathBuf,
        /// Discard Kongsberg pings that are missing beams
        #[arg(long)]
        drop_incomplete: bool,
    },
    /// List the pings of a GWF file
    List {
        /// GWF file
        path: PathBuf,
        /// Write to a file instead of standard output
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Count the records of each type in a vendor file
    Count {
        /// Vendor file
        path: PathBuf,
        /// Write to a file instead of standard output
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write an Avro index of the pings in a GWF file
    Index {
        /// GWF file
        path: PathBuf,
        /// Avro file to create
        output: PathBuf,
    },
}

/// Run a parsed command line
pub fn run(args: Args) -> Result<()> {
    match args.cmd {
        Action::Analyze { paths } => {
            analyze::analyze(&paths)?;
        }
        Action::Convert {
            input,
            output,
            drop_incomplete,
        } => {
            let config = DecoderConfig::default().allow_incomplete_pings(!drop_incomplete);
            convert::convert(&input, &output, config)?;
        }
        Action::List { path, output } => {
            list::list(path, output)?;
        }
        Action::Count { path, output } => {
            count::count(path, output)?;
        }
        Action::Index { path, output } => {
            index::index(&path, &output)?;
        }
    };
    Ok(())
}

/// Standard output, or a new file when a path is given
fn output_writer(output: Option<PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(BufWriter::new(std::fs::File::create(path)?)),
        None => Box::new(stdout().lock()),
    })
}

pub mod analyze;
pub mod convert;
pub mod count;
pub mod index;
pub mod list;
