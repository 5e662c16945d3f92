//! Bookkeeping collaborators
//!
//! Where completed reads and written files are recorded. Both are opaque to
//! the tasks: they only report success or failure.

use crate::error::{Result, TapeLibraryError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRecord {
    pub file_name: String,
    pub tape_code: String,
    pub file_position: u32,
    pub staged_path: PathBuf,
    pub read_at: DateTime<Utc>,
}

/// Audit trail of files staged back from tape
pub trait ReadRequestRepository: Send + Sync {
    fn record_read(&self, record: ReadRecord) -> Result<()>;
}

/// On-tape location of a written file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnTapeLocation {
    pub tape_code: String,
    pub file_position: u32,
}

/// Index from written file to its on-tape location
pub trait ArchiveReferential: Send + Sync {
    fn record_on_tape(&self, file_path: &str, location: OnTapeLocation) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryReadRequestRepository {
    records: Mutex<Vec<ReadRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryReadRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ReadRecord> {
        self.records.lock().clone()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }
}

impl ReadRequestRepository for InMemoryReadRequestRepository {
    fn record_read(&self, record: ReadRecord) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TapeLibraryError::catalog("read request repository is unavailable"));
        }
        self.records.lock().push(record);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryArchiveReferential {
    locations: Mutex<HashMap<String, OnTapeLocation>>,
}

impl InMemoryArchiveReferential {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn location(&self, file_path: &str) -> Option<OnTapeLocation> {
        self.locations.lock().get(file_path).cloned()
    }
}

impl ArchiveReferential for InMemoryArchiveReferential {
    fn record_on_tape(&self, file_path: &str, location: OnTapeLocation) -> Result<()> {
        self.locations.lock().insert(file_path.to_string(), location);
        Ok(())
    }
}
