//! Simulate Command Handler
//!
//! Handles the `simulate` subcommand: builds a simulated library and its
//! catalog from the configuration, then drains a batch of orders with one
//! blocking worker per drive.

use crate::catalog::InMemoryTapeCatalog;
use crate::config::LibraryConfig;
use crate::error::Result;
use crate::library::TapeLibraryService;
use crate::model::{StatusCode, TapeCartridge};
use crate::referential::{InMemoryArchiveReferential, InMemoryReadRequestRepository};
use crate::retention::DirectoryRetentionPolicy;
use crate::robot::TapeRobotPool;
use crate::simulator::TapeLibrarySimulator;
use crate::utils::RetryPolicy;
use crate::worker::{OrderOutcome, OrderQueue, TapeDriveWorker, TapeOrder, WorkerServices};
use crossbeam::channel;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct SimulationReport {
    /// Every attempt, in completion order
    pub outcomes: Vec<OrderOutcome>,
    /// Catalog after the run
    pub catalog: Vec<TapeCartridge>,
    /// Misuse refused by the simulated hardware
    pub failures: Vec<String>,
}

impl SimulationReport {
    /// Final attempt of each order
    pub fn final_outcomes(&self) -> Vec<&OrderOutcome> {
        let mut last: Vec<&OrderOutcome> = self.outcomes.iter().filter(|o| !o.requeued).collect();
        last.sort_by_key(|o| o.order_id);
        last
    }
}

pub async fn execute(config: LibraryConfig, orders: PathBuf, json: bool) -> Result<()> {
    info!("Loading orders from {:?}", orders);
    let content = tokio::fs::read_to_string(&orders).await?;
    let orders: Vec<TapeOrder> = serde_json::from_str(&content)?;

    let report = run(&config, orders).await?;

    if json {
        for outcome in &report.outcomes {
            println!("{}", serde_json::to_string(outcome)?);
        }
        return Ok(());
    }

    println!("📋 Orders:");
    for outcome in report.final_outcomes() {
        let tape = outcome
            .result
            .current_tape
            .as_ref()
            .map(|t| t.code.as_str())
            .unwrap_or("-");
        let mark = if outcome.result.status == StatusCode::Ok { "✅" } else { "❌" };
        println!(
            "  {} #{} {} on drive {} after {} attempt(s): {:?}/{:?}, tape {}",
            mark,
            outcome.order_id,
            describe(&outcome.order),
            outcome.drive_index,
            outcome.attempt,
            outcome.result.status,
            outcome.result.order_state,
            tape
        );
    }
    println!("📼 Catalog:");
    for cartridge in &report.catalog {
        println!(
            "  • {:<10} {:<10} {:?} files={} bucket={}",
            cartridge.code,
            cartridge.current_location,
            cartridge.state,
            cartridge.file_count,
            cartridge.bucket.as_deref().unwrap_or("-")
        );
    }
    if !report.failures.is_empty() {
        println!("⚠️  Refused by the library:");
        for failure in &report.failures {
            println!("  • {}", failure);
        }
    }
    Ok(())
}

fn describe(order: &TapeOrder) -> String {
    match order {
        TapeOrder::Read(o) => format!("read {}@{} -> {}", o.tape_code, o.file_position, o.file_name),
        TapeOrder::Write(o) => format!("write {} -> bucket {}", o.file_path, o.bucket),
    }
}

/// Drain `orders` against a fresh simulated library built from `config`
pub async fn run(config: &LibraryConfig, orders: Vec<TapeOrder>) -> Result<SimulationReport> {
    config.validate()?;
    tokio::fs::create_dir_all(&config.input_directory).await?;

    let simulator = TapeLibrarySimulator::new(
        &config.library,
        config.drives,
        config.slots,
        config.cartridges,
        config.output_directory.join(".staging"),
    )?
    .with_capacity(config.max_tape_capacity_bytes);
    let catalog = Arc::new(InMemoryTapeCatalog::with_cartridges(simulator.initial_catalog())?);
    let robots: Arc<dyn TapeRobotPool> = Arc::new(
        simulator.robot_pool(config.robots, config.robot_checkout_timeout()),
    );
    let retention = Arc::new(DirectoryRetentionPolicy::new(
        &config.output_directory,
        config.staged_file_lifetime(),
    )?);

    let services = WorkerServices {
        catalog: catalog.clone(),
        read_requests: Arc::new(InMemoryReadRequestRepository::new()),
        retention: retention.clone(),
        archive_referential: Arc::new(InMemoryArchiveReferential::new()),
        write_options: config.write_task_options(),
        retry: RetryPolicy::default(),
        max_attempts: config.max_order_attempts,
    };

    let queue = Arc::new(OrderQueue::new());
    for order in orders {
        queue.push(order);
    }
    info!(
        "Running {} orders on {} drives of library {}",
        queue.len(),
        config.drives,
        config.library
    );

    let (tx, rx) = channel::unbounded();
    let mut handles = Vec::new();
    for index in 0..config.drives {
        let library = TapeLibraryService::new(simulator.drive(index), robots.clone());
        let worker = TapeDriveWorker::new(library, services.clone(), queue.clone(), tx.clone());
        handles.push(tokio::task::spawn_blocking(move || worker.run()));
    }
    drop(tx);

    for handle in handles {
        handle
            .await
            .map_err(|e| anyhow::anyhow!("drive worker panicked: {}", e))?;
    }

    retention.purge_expired()?;

    Ok(SimulationReport {
        outcomes: rx.try_iter().collect(),
        catalog: catalog.list(),
        failures: simulator.failures(),
    })
}
