//! Read Task
//!
//! Copies one file mark of a cartridge into the staging area, swapping the
//! cartridge mounted in the drive first when it is not the one the order
//! names.

use super::{persist, release_unused, unload_current, verify_label};
use crate::catalog::{CatalogCriteria, TapeCatalogService};
use crate::error::Result;
use crate::library::{ReadWriteError, ReadWriteErrorCode, ReadWriteOutcome, TapeLibraryService};
use crate::model::{QueueState, ReadOrder, ReadWriteResult, StatusCode, TapeCartridge, TapeLocationType};
use crate::referential::{ReadRecord, ReadRequestRepository};
use crate::retention::RetentionPolicy;
use crate::utils::RetryPolicy;
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Suffix of a file still being transferred from tape
pub const TEMP_EXT: &str = ".tmp";

pub struct ReadTask {
    order: ReadOrder,
    current_tape: Option<TapeCartridge>,
    library: TapeLibraryService,
    catalog: Arc<dyn TapeCatalogService>,
    read_requests: Arc<dyn ReadRequestRepository>,
    retention: Arc<dyn RetentionPolicy>,
    retry: RetryPolicy,
}

impl ReadTask {
    /// `current_tape` is the cartridge this drive is believed to hold, `None` for an empty drive
    pub fn new(
        order: ReadOrder,
        current_tape: Option<TapeCartridge>,
        library: TapeLibraryService,
        catalog: Arc<dyn TapeCatalogService>,
        read_requests: Arc<dyn ReadRequestRepository>,
        retention: Arc<dyn RetentionPolicy>,
    ) -> Result<Self> {
        order.validate()?;
        Ok(Self {
            order,
            current_tape,
            library,
            catalog,
            read_requests,
            retention,
            retry: RetryPolicy::default(),
        })
    }

    /// Retry policy for catalog and bookkeeping writes
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn run(mut self) -> ReadWriteResult {
        info!(
            "{}Action : read, [Tape] : {}, position : {}, file : {}",
            self.library.msg_prefix(),
            self.order.tape_code,
            self.order.file_position,
            self.order.file_name
        );

        let mounted = self.current_tape.take();
        let result = match mounted {
            Some(tape) if self.is_eligible(&tape) => self.transfer(tape, false),
            mounted => match self.swap(mounted) {
                Ok((working, head_known)) => self.transfer(working, head_known),
                Err(result) => result,
            },
        };

        info!(
            "{}Read of {} finished: {:?}/{:?}, current tape: {}",
            self.library.msg_prefix(),
            self.order.file_name,
            result.status,
            result.order_state,
            result
                .current_tape
                .as_ref()
                .map(|t| t.code.as_str())
                .unwrap_or("none")
        );
        result
    }

    fn is_eligible(&self, tape: &TapeCartridge) -> bool {
        tape.code == self.order.tape_code && tape.current_location.is_drive()
    }

    fn reject(
        &self,
        err: ReadWriteError,
        status: StatusCode,
        order_state: QueueState,
        current_tape: Option<TapeCartridge>,
    ) -> ReadWriteResult {
        match order_state {
            QueueState::Error => error!("{}", err),
            _ => warn!("{}", err),
        }
        ReadWriteResult::new(status, order_state, current_tape)
    }

    fn catalog_error(&self, err: impl std::fmt::Display) -> ReadWriteError {
        ReadWriteError::new(
            ReadWriteErrorCode::CatalogAccess,
            format!(
                "{}[Tape] : {}, Error: {}",
                self.library.msg_prefix(),
                self.order.tape_code,
                err
            ),
        )
    }

    /// Check out the ordered cartridge, telling "unknown" from "busy" when it cannot be had
    fn resolve_target(&self) -> std::result::Result<TapeCartridge, ReadWriteResult> {
        let criteria = CatalogCriteria::by_code(&self.order.tape_code);
        match self.catalog.receive(&criteria) {
            Ok(Some(tape)) => Ok(tape),
            Ok(None) => Err(match self.catalog.find(&criteria) {
                Ok(found) if found.is_empty() => self.reject(
                    ReadWriteError::new(
                        ReadWriteErrorCode::TapeNotFoundInCatalog,
                        format!(
                            "{}[Tape] : {}, Error: unknown cartridge",
                            self.library.msg_prefix(),
                            self.order.tape_code
                        ),
                    ),
                    StatusCode::Fatal,
                    QueueState::Error,
                    None,
                ),
                Ok(_) => self.reject(
                    ReadWriteError::new(
                        ReadWriteErrorCode::TapeBusyInCatalog,
                        format!(
                            "{}[Tape] : {}, Error: cartridge is used by another task",
                            self.library.msg_prefix(),
                            self.order.tape_code
                        ),
                    ),
                    StatusCode::Fatal,
                    QueueState::Error,
                    None,
                ),
                Err(e) => self.reject(self.catalog_error(e), StatusCode::Ko, QueueState::Ready, None),
            }),
            Err(e) => Err(self.reject(self.catalog_error(e), StatusCode::Ko, QueueState::Ready, None)),
        }
    }

    /// Get the ordered cartridge into this drive, unloading whatever it holds.
    /// The flag tells whether the head position is known from a label check.
    fn swap(
        &self,
        mounted: Option<TapeCartridge>,
    ) -> std::result::Result<(TapeCartridge, bool), ReadWriteResult> {
        let drive_index = self.library.drive_index();
        let mut target = self.resolve_target()?;

        match target.current_location.location_type() {
            TapeLocationType::Slot => {}
            TapeLocationType::Drive if target.is_mounted_in(drive_index) => {
                debug!(
                    "{}[Tape] : {}, already in this drive",
                    self.library.msg_prefix(),
                    target.code
                );
                return Ok((target, false));
            }
            TapeLocationType::Drive | TapeLocationType::Outside => {
                let code = match target.current_location.location_type() {
                    TapeLocationType::Outside => ReadWriteErrorCode::TapeLocationUnknown,
                    _ => ReadWriteErrorCode::TapeLocationConflictOnLoad,
                };
                let err = ReadWriteError::new(
                    code,
                    format!(
                        "{}[Tape] : {}, Error: cartridge is in {}, out of reach",
                        self.library.msg_prefix(),
                        target.code,
                        target.current_location
                    ),
                );
                release_unused(&self.library, self.catalog.as_ref(), &self.retry, &target);
                return Err(self.reject(err, StatusCode::Fatal, QueueState::Error, None));
            }
        }

        if let Some(current) = mounted.as_ref().filter(|t| t.current_location.is_drive()) {
            if let Err(e) = unload_current(&self.library, self.catalog.as_ref(), &self.retry, current) {
                release_unused(&self.library, self.catalog.as_ref(), &self.retry, &target);
                return Err(match e.code {
                    // the drive is empty, only the catalog lags behind
                    ReadWriteErrorCode::KoDbPersist => {
                        self.reject(e, StatusCode::Ko, QueueState::Ready, None)
                    }
                    _ => self.reject(e, StatusCode::Fatal, QueueState::Ready, mounted),
                });
            }
        }

        if let Err(e) = self.library.load_tape(&mut target) {
            return Err(match e.code {
                ReadWriteErrorCode::RobotUnavailable => {
                    release_unused(&self.library, self.catalog.as_ref(), &self.retry, &target);
                    self.reject(e, StatusCode::Fatal, QueueState::Ready, None)
                }
                // drive contents unknown, the cartridge stays checked out for an operator
                _ => self.reject(e, StatusCode::Fatal, QueueState::Error, None),
            });
        }

        if let Err(e) = persist(&self.library, self.catalog.as_ref(), &self.retry, &target) {
            return Err(self.reject(e, StatusCode::Ko, QueueState::Ready, Some(target)));
        }

        let expected = match target.label.clone() {
            Some(label) => label,
            None => return Ok((target, false)),
        };
        if let Err(e) = self.library.rewind_tape(&mut target, ReadWriteErrorCode::KoOnRewindTape) {
            return Err(self.reject(e, StatusCode::Fatal, QueueState::Ready, Some(target)));
        }
        // wrong or unreadable cartridge in the slot, an operator has to look at it
        if let Err(e) = verify_label(&self.library, &mut target, &expected) {
            return Err(self.reject(e, StatusCode::Fatal, QueueState::Error, Some(target)));
        }
        Ok((target, true))
    }

    fn transfer(&self, mut working: TapeCartridge, head_known: bool) -> ReadWriteResult {
        let position = self.order.file_position;
        let code = ReadWriteErrorCode::KoOnGoToPosition;
        let positioned = if head_known {
            self.library.go_to_position(&mut working, position, code)
        } else {
            self.library.seek_from_start(&mut working, position, code)
        };
        if let Err(e) = positioned {
            return self.reject(e, StatusCode::Fatal, QueueState::Ready, Some(working));
        }

        let staged_name = format!("{}{}", self.order.file_name, TEMP_EXT);
        if let Err(e) = self.library.read(&mut working, &staged_name) {
            return self.reject(e, StatusCode::Fatal, QueueState::Error, Some(working));
        }

        let published = match self.publish(&working, &staged_name) {
            Ok(path) => path,
            Err(e) => return self.reject(e, StatusCode::Fatal, QueueState::Ready, Some(working)),
        };

        let record = ReadRecord {
            file_name: self.order.file_name.clone(),
            tape_code: working.code.clone(),
            file_position: self.order.file_position,
            staged_path: published,
            read_at: Utc::now(),
        };
        // the file is published, a bookkeeping miss does not undo the read
        if let Err(e) = self
            .retry
            .run("record read", || self.read_requests.record_read(record.clone()))
        {
            warn!(
                "{}[Tape] : {}, read of {} not recorded: {}",
                self.library.msg_prefix(),
                working.code,
                self.order.file_name,
                e
            );
        }

        if let Err(e) = persist(&self.library, self.catalog.as_ref(), &self.retry, &working) {
            warn!("{}Head position not persisted: {}", self.library.msg_prefix(), e);
        }
        ReadWriteResult::completed(working)
    }

    /// Move the staged file under its final name into the retention output directory
    fn publish(&self, tape: &TapeCartridge, staged_name: &str) -> ReadWriteOutcome<PathBuf> {
        let staged = self.library.output_directory().join(staged_name);
        let target = self.retention.output_directory().join(&self.order.file_name);

        move_file(&staged, &target).map_err(|e| {
            if let Err(cleanup) = fs::remove_file(&staged) {
                debug!("Could not remove {:?}: {}", staged, cleanup);
            }
            ReadWriteError::new(
                ReadWriteErrorCode::InternalError,
                format!(
                    "{}[Tape] : {}, Error: cannot publish {:?} as {:?}: {}",
                    self.library.msg_prefix(),
                    tape.code,
                    staged,
                    target,
                    e
                ),
            )
        })?;
        debug!("Published {:?}", target);
        Ok(target)
    }
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // different filesystems
    fs::copy(from, to)?;
    fs::remove_file(from)
}
