//! Staging retention
//!
//! Files read back from tape are staged in one output directory and kept
//! there for a bounded lifetime.

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

pub trait RetentionPolicy: Send + Sync {
    /// Where completed reads are published
    fn output_directory(&self) -> &Path;

    /// How long a staged file is kept
    fn lifetime(&self) -> Duration;
}

#[derive(Debug, Clone)]
pub struct DirectoryRetentionPolicy {
    output_directory: PathBuf,
    lifetime: Duration,
}

impl DirectoryRetentionPolicy {
    pub fn new<P: Into<PathBuf>>(output_directory: P, lifetime: Duration) -> Result<Self> {
        let output_directory = output_directory.into();
        fs::create_dir_all(&output_directory)?;
        Ok(Self {
            output_directory,
            lifetime,
        })
    }

    /// Delete staged files older than the lifetime, returning how many went
    pub fn purge_expired(&self) -> Result<usize> {
        self.purge_older_than(SystemTime::now())
    }

    fn purge_older_than(&self, now: SystemTime) -> Result<usize> {
        let mut purged = 0;
        for entry in fs::read_dir(&self.output_directory)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let age = now
                .duration_since(metadata.modified()?)
                .unwrap_or(Duration::ZERO);
            if age >= self.lifetime {
                debug!("Purging staged file {:?} (age {:?})", entry.path(), age);
                fs::remove_file(entry.path())?;
                purged += 1;
            }
        }
        if purged > 0 {
            info!("Purged {} expired staged files from {:?}", purged, self.output_directory);
        }
        Ok(purged)
    }
}

impl RetentionPolicy for DirectoryRetentionPolicy {
    fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    fn lifetime(&self) -> Duration {
        self.lifetime
    }
}
