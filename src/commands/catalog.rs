//! Catalog Command Handler
//!
//! Handles the `catalog` subcommand: lists the cartridges of the configured
//! simulated library as they are registered before any order runs.

use crate::config::LibraryConfig;
use crate::error::Result;
use crate::simulator::TapeLibrarySimulator;
use tracing::info;

pub async fn execute(config: LibraryConfig) -> Result<()> {
    let staging = std::env::temp_dir().join("tapeoffer-catalog");
    let simulator = TapeLibrarySimulator::new(
        &config.library,
        config.drives,
        config.slots,
        config.cartridges,
        &staging,
    )?;
    let cartridges = simulator.initial_catalog();
    info!("Library {} holds {} cartridges", config.library, cartridges.len());

    println!("📼 Library {} ({} drives, {} slots)", config.library, config.drives, config.slots);
    for cartridge in &cartridges {
        println!(
            "  • {:<10} {:<10} {:?}",
            cartridge.code, cartridge.current_location, cartridge.state
        );
    }
    Ok(())
}
