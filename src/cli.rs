use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tapeoffer")]
#[command(about = "Tape library storage offer: runs read/write orders against a simulated tape library")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Specify configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a batch of orders against a simulated library, one worker per drive
    Simulate {
        /// JSON file holding a list of read/write orders
        #[arg(short, long, value_name = "FILE")]
        orders: PathBuf,

        /// Print every attempt as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Show the initial catalog of the configured library
    Catalog,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
