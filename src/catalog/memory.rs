use super::{CatalogCriteria, TapeCatalogService};
use crate::error::{Result, TapeLibraryError};
use crate::model::TapeCartridge;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct CatalogEntry {
    cartridge: TapeCartridge,
    checked_out: bool,
}

/// Mutex-guarded catalog keyed by cartridge code.
///
/// Every call returns owned copies, callers never alias the stored records.
#[derive(Debug, Default)]
pub struct InMemoryTapeCatalog {
    entries: Mutex<BTreeMap<String, CatalogEntry>>,
    unavailable: AtomicBool,
}

impl InMemoryTapeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cartridges<I: IntoIterator<Item = TapeCartridge>>(cartridges: I) -> Result<Self> {
        let catalog = Self::new();
        for cartridge in cartridges {
            catalog.add(cartridge)?;
        }
        Ok(catalog)
    }

    /// Register a new cartridge (idle)
    pub fn add(&self, cartridge: TapeCartridge) -> Result<()> {
        self.ensure_available()?;
        let mut entries = self.entries.lock();
        if entries.contains_key(&cartridge.code) {
            return Err(TapeLibraryError::catalog(format!(
                "cartridge {} is already registered",
                cartridge.code
            )));
        }
        debug!("Registering cartridge {} at {}", cartridge.code, cartridge.current_location);
        entries.insert(
            cartridge.code.clone(),
            CatalogEntry {
                cartridge,
                checked_out: false,
            },
        );
        Ok(())
    }

    /// Snapshot of every record, ordered by code
    pub fn list(&self) -> Vec<TapeCartridge> {
        self.entries
            .lock()
            .values()
            .map(|e| e.cartridge.clone())
            .collect()
    }

    pub fn get(&self, code: &str) -> Option<TapeCartridge> {
        self.entries.lock().get(code).map(|e| e.cartridge.clone())
    }

    pub fn is_checked_out(&self, code: &str) -> bool {
        self.entries
            .lock()
            .get(code)
            .map(|e| e.checked_out)
            .unwrap_or(false)
    }

    /// Simulate the backing store going away (every call fails) or coming back
    pub fn set_available(&self, available: bool) {
        if !available {
            warn!("Tape catalog marked unavailable");
        }
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TapeLibraryError::catalog("tape catalog store is unavailable"));
        }
        Ok(())
    }

    fn store(&self, cartridge: &TapeCartridge, checked_out: Option<bool>) -> Result<()> {
        self.ensure_available()?;
        let mut entries = self.entries.lock();

        if cartridge.current_location.is_drive() {
            let clash = entries.values().find(|e| {
                e.cartridge.code != cartridge.code
                    && e.cartridge.current_location == cartridge.current_location
            });
            if let Some(other) = clash {
                return Err(TapeLibraryError::catalog(format!(
                    "{} already holds cartridge {}, cannot record {} there",
                    cartridge.current_location, other.cartridge.code, cartridge.code
                )));
            }
        }

        let entry = entries.get_mut(&cartridge.code).ok_or_else(|| {
            TapeLibraryError::catalog(format!("cartridge {} is not registered", cartridge.code))
        })?;
        entry.cartridge = cartridge.clone();
        if let Some(checked_out) = checked_out {
            entry.checked_out = checked_out;
        }
        Ok(())
    }
}

impl TapeCatalogService for InMemoryTapeCatalog {
    fn receive(&self, criteria: &CatalogCriteria) -> Result<Option<TapeCartridge>> {
        self.ensure_available()?;
        let mut entries = self.entries.lock();
        let found = entries
            .values_mut()
            .find(|e| !e.checked_out && criteria.matches(&e.cartridge));

        Ok(found.map(|entry| {
            entry.checked_out = true;
            debug!("Checked out cartridge {}", entry.cartridge.code);
            entry.cartridge.clone()
        }))
    }

    fn find(&self, criteria: &CatalogCriteria) -> Result<Vec<TapeCartridge>> {
        self.ensure_available()?;
        Ok(self
            .entries
            .lock()
            .values()
            .filter(|e| criteria.matches(&e.cartridge))
            .map(|e| e.cartridge.clone())
            .collect())
    }

    fn replace(&self, cartridge: &TapeCartridge) -> Result<()> {
        self.store(cartridge, None)
    }

    fn release(&self, cartridge: &TapeCartridge) -> Result<()> {
        debug!("Releasing cartridge {}", cartridge.code);
        self.store(cartridge, Some(false))
    }
}
