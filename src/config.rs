//! Library configuration
//!
//! Read from a JSON file; every field has a default so a partial file (or
//! none at all) is enough.

use crate::error::{Result, TapeLibraryError};
use crate::worker::WriteTaskOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub library: String,
    pub drives: u32,
    pub slots: u32,
    pub cartridges: u32,
    pub robots: u32,
    /// Where write orders find their files
    pub input_directory: PathBuf,
    /// Where completed reads are published
    pub output_directory: PathBuf,
    pub full_cartridge_threshold_mb: Option<u64>,
    /// Simulated medium size, unlimited when absent
    pub max_tape_capacity_bytes: Option<u64>,
    pub force_override_non_empty_cartridges: bool,
    pub max_order_attempts: u32,
    pub staged_file_lifetime_secs: u64,
    pub robot_checkout_timeout_secs: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            library: "TAPE_LIB_1".to_string(),
            drives: 2,
            slots: 10,
            cartridges: 4,
            robots: 1,
            input_directory: PathBuf::from("tape-offer/input"),
            output_directory: PathBuf::from("tape-offer/output"),
            full_cartridge_threshold_mb: None,
            max_tape_capacity_bytes: None,
            force_override_non_empty_cartridges: false,
            max_order_attempts: 3,
            staged_file_lifetime_secs: 24 * 3600,
            robot_checkout_timeout_secs: 60,
        }
    }
}

impl LibraryConfig {
    /// Load `path`, or the defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                debug!("Loading configuration from {:?}", path);
                let content = fs::read_to_string(path).map_err(|e| {
                    TapeLibraryError::config(format!("cannot read {:?}: {}", path, e))
                })?;
                serde_json::from_str(&content)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.library.trim().is_empty() {
            return Err(TapeLibraryError::config("library identifier is empty"));
        }
        if self.drives == 0 {
            return Err(TapeLibraryError::config("at least one drive is required"));
        }
        if self.slots == 0 {
            return Err(TapeLibraryError::config("at least one slot is required"));
        }
        if self.cartridges > self.slots {
            return Err(TapeLibraryError::config(format!(
                "{} cartridges do not fit in {} slots",
                self.cartridges, self.slots
            )));
        }
        if self.max_order_attempts == 0 {
            return Err(TapeLibraryError::config("max_order_attempts must be positive"));
        }
        Ok(())
    }

    pub fn staged_file_lifetime(&self) -> Duration {
        Duration::from_secs(self.staged_file_lifetime_secs)
    }

    pub fn robot_checkout_timeout(&self) -> Duration {
        Duration::from_secs(self.robot_checkout_timeout_secs)
    }

    pub fn write_task_options(&self) -> WriteTaskOptions {
        WriteTaskOptions {
            input_directory: self.input_directory.clone(),
            force_override_non_empty_cartridges: self.force_override_non_empty_cartridges,
            full_cartridge_threshold_bytes: self.full_cartridge_threshold_mb.map(|mb| mb * MB),
        }
    }
}
