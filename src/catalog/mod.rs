//! Tape Catalog
//!
//! The catalog is the only state shared between drive workers. `receive` is
//! the single mutual-exclusion point for cartridges: a cartridge handed out by
//! `receive` stays checked out until it is released.

pub mod criteria;
pub mod memory;

pub use criteria::{BucketFilter, CatalogCriteria};
pub use memory::InMemoryTapeCatalog;

use crate::error::Result;
use crate::model::TapeCartridge;

pub trait TapeCatalogService: Send + Sync {
    /// Atomically check out one idle cartridge matching `criteria`.
    ///
    /// Returns `None` both when nothing matches and when every match is
    /// already checked out; use [`find`](Self::find) to tell them apart.
    fn receive(&self, criteria: &CatalogCriteria) -> Result<Option<TapeCartridge>>;

    /// Non-exclusive lookup over the whole catalog, busy or not
    fn find(&self, criteria: &CatalogCriteria) -> Result<Vec<TapeCartridge>>;

    /// Persist a cartridge record, keeping its checkout state
    fn replace(&self, cartridge: &TapeCartridge) -> Result<()>;

    /// Persist a cartridge record and return it to the idle pool
    fn release(&self, cartridge: &TapeCartridge) -> Result<()>;
}
