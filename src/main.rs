use tape_offer::cli::{Cli, Commands};
use tape_offer::config::LibraryConfig;
use tape_offer::error::Result;
use tape_offer::{commands, logger};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse_args();

    // Initialize logging system
    logger::init(args.verbose, args.json_logs)?;

    debug!("tapeoffer starting");

    match run(args).await {
        Ok(_) => {
            info!("Operation completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Operation failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(args: Cli) -> Result<()> {
    let config = LibraryConfig::load(args.config.as_deref())?;

    match args.command {
        Commands::Simulate { orders, json } => commands::simulate::execute(config, orders, json).await,
        Commands::Catalog => commands::catalog::execute(config).await,
    }
}
