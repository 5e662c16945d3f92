//! Tape Offer Library
//!
//! Cold-storage tier of an archiving platform: a catalog of tape cartridges,
//! the drive and robot contracts of a tape library, and the read/write tasks
//! that execute one order on one drive and classify the outcome for the
//! order queue.

pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod drive;
pub mod error;
pub mod library;
pub mod logger;
pub mod model;
pub mod referential;
pub mod retention;
pub mod robot;
pub mod simulator;
pub mod utils;
pub mod worker;

#[cfg(test)]
mod testing;
#[cfg(test)]
mod tests;

// Re-export key types for easier use
pub use catalog::{CatalogCriteria, InMemoryTapeCatalog, TapeCatalogService};
pub use config::LibraryConfig;
pub use error::{Result, TapeLibraryError};
pub use library::{ReadWriteError, ReadWriteErrorCode, TapeLibraryService};
pub use model::{
    QueueState, ReadOrder, ReadWriteResult, StatusCode, TapeCartridge, TapeLocation, TapeState,
    WriteOrder,
};
pub use worker::{ReadTask, TapeDriveWorker, WriteTask};
