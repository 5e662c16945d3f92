//! Write Task
//!
//! Appends one staged file to an OPEN cartridge of the order's bucket,
//! opening (labeling) an EMPTY cartridge when none is available. A cartridge
//! that reaches end of tape is closed as FULL and the write moves on to the
//! next one.

use super::{persist, release_unused, unload_current, verify_label, TAPE_LABEL_PREFIX};
use crate::catalog::{BucketFilter, CatalogCriteria, TapeCatalogService};
use crate::error::Result;
use crate::library::{ReadWriteError, ReadWriteErrorCode, ReadWriteOutcome, TapeLibraryService};
use crate::model::{
    QueueState, ReadWriteResult, StatusCode, TapeCartridge, TapeLocationType, TapeState,
    WriteOrder,
};
use crate::referential::{ArchiveReferential, OnTapeLocation};
use crate::utils::{format_bytes, RetryPolicy};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const LABEL_STAGING_DIR: &str = ".labels";
const WRITE_RETRIES: u32 = 2;
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(20);
/// Extra cartridges tried after a persistent write failure
const CARTRIDGE_RETRY: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTaskOptions {
    /// Directory `WriteOrder::file_path` is relative to
    pub input_directory: PathBuf,
    /// Reuse unlabeled cartridges that turn out to hold data
    pub force_override_non_empty_cartridges: bool,
    /// A failed write past this many bytes is treated as end of tape
    pub full_cartridge_threshold_bytes: Option<u64>,
}

impl WriteTaskOptions {
    pub fn new<P: Into<PathBuf>>(input_directory: P) -> Self {
        Self {
            input_directory: input_directory.into(),
            force_override_non_empty_cartridges: false,
            full_cartridge_threshold_bytes: None,
        }
    }
}

pub struct WriteTask {
    order: WriteOrder,
    current_tape: Option<TapeCartridge>,
    library: TapeLibraryService,
    catalog: Arc<dyn TapeCatalogService>,
    archive_referential: Arc<dyn ArchiveReferential>,
    options: WriteTaskOptions,
    retry: RetryPolicy,
}

impl WriteTask {
    pub fn new(
        order: WriteOrder,
        current_tape: Option<TapeCartridge>,
        library: TapeLibraryService,
        catalog: Arc<dyn TapeCatalogService>,
        archive_referential: Arc<dyn ArchiveReferential>,
        options: WriteTaskOptions,
    ) -> Result<Self> {
        order.validate()?;
        Ok(Self {
            order,
            current_tape,
            library,
            catalog,
            archive_referential,
            options,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn run(mut self) -> ReadWriteResult {
        info!(
            "{}Action : write, bucket : {}, file : {} ({})",
            self.library.msg_prefix(),
            self.order.bucket,
            self.order.file_path,
            format_bytes(self.order.size)
        );

        let mut current = self.current_tape.take();
        let result = self.execute(&mut current);

        info!(
            "{}Write of {} finished: {:?}/{:?}, current tape: {}",
            self.library.msg_prefix(),
            self.order.file_path,
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

    fn execute(&self, current: &mut Option<TapeCartridge>) -> ReadWriteResult {
        let source = self.options.input_directory.join(&self.order.file_path);
        if !source.is_file() {
            let err = ReadWriteError::new(
                ReadWriteErrorCode::FileNotFound,
                format!("{}Action : write, Error: file {:?} not found", self.library.msg_prefix(), source),
            );
            return self.reject(err, StatusCode::Fatal, QueueState::Error, current.take());
        }

        let mut cartridge_retry = CARTRIDGE_RETRY;
        loop {
            let err = match self.attempt(current, &source) {
                Ok(position) => return self.complete(current, &source, position),
                Err(err) => err,
            };

            match err.code {
                ReadWriteErrorCode::KoOnEndOfTape => {
                    warn!("{}", err);
                    self.close(current, TapeState::Full);
                }
                ReadWriteErrorCode::KoOnWriteToTape if cartridge_retry > 0 => {
                    warn!("{}", err);
                    cartridge_retry -= 1;
                    self.close(current, TapeState::Conflict);
                }
                ReadWriteErrorCode::KoLabelDiscording
                | ReadWriteErrorCode::KoLabelDiscordingNotEmptyTape
                | ReadWriteErrorCode::KoUnknownCurrentPosition => {
                    self.close(current, TapeState::Conflict);
                    return self.reject(err, StatusCode::Fatal, QueueState::Ready, current.take());
                }
                ReadWriteErrorCode::KoDbPersist | ReadWriteErrorCode::CatalogAccess => {
                    return self.reject(err, StatusCode::Ko, QueueState::Ready, current.take());
                }
                ReadWriteErrorCode::KoOnLoadTape => {
                    return self.reject(err, StatusCode::Fatal, QueueState::Error, None);
                }
                ReadWriteErrorCode::FileNotFound | ReadWriteErrorCode::InternalError => {
                    return self.reject(err, StatusCode::Fatal, QueueState::Error, current.take());
                }
                _ => return self.reject(err, StatusCode::Fatal, QueueState::Ready, current.take()),
            }
        }
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

    /// Mark the mounted cartridge as no longer writable
    fn close(&self, current: &mut Option<TapeCartridge>, state: TapeState) {
        if let Some(tape) = current.as_mut() {
            warn!(
                "{}[Tape] : {}, marked as {:?}",
                self.library.msg_prefix(),
                tape.code,
                state
            );
            tape.state = state;
            if let Err(e) = persist(&self.library, self.catalog.as_ref(), &self.retry, tape) {
                error!("{}", e);
            }
        }
    }

    fn complete(
        &self,
        current: &mut Option<TapeCartridge>,
        source: &Path,
        file_position: u32,
    ) -> ReadWriteResult {
        let tape_code = current.as_ref().map(|t| t.code.clone()).unwrap_or_default();
        let location = OnTapeLocation {
            tape_code,
            file_position,
        };
        if let Err(e) = self.retry.run("archive referential update", || {
            self.archive_referential
                .record_on_tape(&self.order.file_path, location.clone())
        }) {
            let err = ReadWriteError::new(
                ReadWriteErrorCode::KoDbPersist,
                format!("{}Action : record {}, Error: {}", self.library.msg_prefix(), self.order.file_path, e),
            );
            return self.reject(err, StatusCode::Ko, QueueState::Ready, current.take());
        }

        if let Err(e) = fs::remove_file(source) {
            warn!("{}Staged file {:?} not removed: {}", self.library.msg_prefix(), source, e);
        }
        ReadWriteResult::new(StatusCode::Ok, QueueState::Completed, current.take())
    }

    fn can_write_on(&self, tape: &TapeCartridge) -> bool {
        if !tape.current_location.is_drive() {
            return false;
        }
        match tape.state {
            TapeState::Empty => true,
            TapeState::Open => tape.bucket.as_deref() == Some(self.order.bucket.as_str()),
            TapeState::Full | TapeState::Conflict => false,
        }
    }

    /// One pass: make sure a writable cartridge is mounted, then write.
    /// Returns the file position the order landed on.
    fn attempt(&self, current: &mut Option<TapeCartridge>, source: &Path) -> ReadWriteOutcome<u32> {
        if let Some(tape) = current.as_mut() {
            if self.can_write_on(tape) {
                return self.write(tape, source);
            }
            match unload_current(&self.library, self.catalog.as_ref(), &self.retry, tape) {
                Ok(_) => *current = None,
                Err(e) if e.code == ReadWriteErrorCode::KoDbPersist => {
                    *current = None;
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }

        let mut tape = self.receive_writable()?;
        let drive_index = self.library.drive_index();
        match tape.current_location.location_type() {
            TapeLocationType::Slot => {
                if let Err(e) = self.library.load_tape(&mut tape) {
                    if e.code == ReadWriteErrorCode::RobotUnavailable {
                        release_unused(&self.library, self.catalog.as_ref(), &self.retry, &tape);
                    }
                    return Err(e);
                }
            }
            TapeLocationType::Drive if tape.is_mounted_in(drive_index) => {}
            TapeLocationType::Drive | TapeLocationType::Outside => {
                let err = ReadWriteError::new(
                    ReadWriteErrorCode::TapeLocationConflictOnLoad,
                    format!(
                        "{}[Tape] : {}, Error: cartridge is in {}",
                        self.library.msg_prefix(),
                        tape.code,
                        tape.current_location
                    ),
                );
                release_unused(&self.library, self.catalog.as_ref(), &self.retry, &tape);
                return Err(err);
            }
        }

        let tape = current.insert(tape);
        persist(&self.library, self.catalog.as_ref(), &self.retry, tape)?;
        self.library.rewind_tape(tape, ReadWriteErrorCode::KoOnRewindTape)?;
        self.check_label(tape)?;
        self.write(tape, source)
    }

    /// An OPEN cartridge of the bucket first, otherwise an EMPTY one
    fn receive_writable(&self) -> ReadWriteOutcome<TapeCartridge> {
        let library = self.library.library_identifier();
        let open = CatalogCriteria::in_library(library)
            .with_state(TapeState::Open)
            .with_bucket(BucketFilter::Equals(self.order.bucket.clone()))
            .reachable();
        let empty = CatalogCriteria::in_library(library)
            .with_state(TapeState::Empty)
            .with_bucket(BucketFilter::EqualsOrUnassigned(self.order.bucket.clone()))
            .reachable();

        for criteria in [open, empty] {
            let found = self.catalog.receive(&criteria).map_err(|e| {
                ReadWriteError::new(
                    ReadWriteErrorCode::CatalogAccess,
                    format!("{}Action : receive cartridge, Error: {}", self.library.msg_prefix(), e),
                )
            })?;
            if let Some(tape) = found {
                debug!("{}[Tape] : {}, selected for writing", self.library.msg_prefix(), tape.code);
                return Ok(tape);
            }
        }

        Err(ReadWriteError::new(
            ReadWriteErrorCode::TapeNotFoundInCatalog,
            format!(
                "{}Action : receive cartridge, Error: no writable cartridge for bucket {}",
                self.library.msg_prefix(),
                self.order.bucket
            ),
        ))
    }

    /// Make sure the freshly loaded cartridge is the one the catalog describes
    fn check_label(&self, tape: &mut TapeCartridge) -> ReadWriteOutcome<()> {
        match tape.label.clone() {
            Some(expected) => verify_label(&self.library, tape, &expected),
            None => self.check_unlabeled(tape),
        }
    }

    /// A cartridge without label must be blank, unless overriding is allowed
    fn check_unlabeled(&self, tape: &mut TapeCartridge) -> ReadWriteOutcome<()> {
        let probe = self.library.probe_next_file();
        if probe.is_ok() {
            if !self.options.force_override_non_empty_cartridges {
                tape.current_position += 1;
                return Err(ReadWriteError::new(
                    ReadWriteErrorCode::KoLabelDiscordingNotEmptyTape,
                    format!(
                        "{}[Tape] : {}, Error: cartridge holds data but has no label",
                        self.library.msg_prefix(),
                        tape.code
                    ),
                ));
            }
            warn!(
                "{}[Tape] : {}, overriding non empty cartridge",
                self.library.msg_prefix(),
                tape.code
            );
            self.library
                .rewind_tape(tape, ReadWriteErrorCode::KoRewindBeforeForceOverrideNonEmptyTape)?;
        }

        let status = self.library.drive_status(ReadWriteErrorCode::KoOnStatus)?;
        tape.cartridge_type = status.cartridge.clone();
        tape.worm = status.is_write_protected();
        tape.bucket = Some(self.order.bucket.clone());
        persist(&self.library, self.catalog.as_ref(), &self.retry, tape)
    }

    fn write(&self, tape: &mut TapeCartridge, source: &Path) -> ReadWriteOutcome<u32> {
        if tape.current_position > tape.file_count {
            return Err(ReadWriteError::new(
                ReadWriteErrorCode::KoTapeCurrentPositionGreaterThanFileCount,
                format!(
                    "{}[Tape] : {}, Error: position {} is past file count {}",
                    self.library.msg_prefix(),
                    tape.code,
                    tape.current_position,
                    tape.file_count
                ),
            ));
        }
        if tape.current_position != tape.file_count {
            let file_count = tape.file_count;
            self.library
                .go_to_position(tape, file_count, ReadWriteErrorCode::KoOnGotoFileCount)?;
        }

        if tape.label.is_none() {
            self.write_label(tape)?;
        }
        self.write_file(tape, source)
    }

    /// Write the label as file 0, once per cartridge
    fn write_label(&self, tape: &mut TapeCartridge) -> ReadWriteOutcome<()> {
        tape.bucket = Some(self.order.bucket.clone());
        let label = tape.build_label();

        let internal = |e: &dyn std::fmt::Display| {
            ReadWriteError::new(
                ReadWriteErrorCode::InternalError,
                format!("{}[Tape] : {}, Action : stage label, Error: {}", self.library.msg_prefix(), tape.code, e),
            )
        };
        let dir = self.options.input_directory.join(LABEL_STAGING_DIR);
        fs::create_dir_all(&dir).map_err(|e| internal(&e))?;
        let path = dir.join(format!("{}{}", TAPE_LABEL_PREFIX, Uuid::new_v4()));
        let bytes = serde_json::to_vec(&label).map_err(|e| internal(&e))?;
        fs::write(&path, &bytes).map_err(|e| internal(&e))?;

        let response = self.library.write_to_tape(&path);
        let outcome = if response.is_ok() {
            Ok(())
        } else {
            error!(
                "{}[Tape] : {}, Action : write label, Entity: {}",
                self.library.msg_prefix(),
                tape.code,
                response
            );
            self.retry_write(tape, &path)
        };
        if let Err(e) = fs::remove_file(&path) {
            debug!("Could not remove {:?}: {}", path, e);
        }
        outcome?;

        tape.file_count = 1;
        tape.current_position = 1;
        tape.label = Some(label);
        tape.written_bytes += bytes.len() as u64;
        tape.state = TapeState::Open;
        persist(&self.library, self.catalog.as_ref(), &self.retry, tape)
    }

    fn write_file(&self, tape: &mut TapeCartridge, source: &Path) -> ReadWriteOutcome<u32> {
        let size = fs::metadata(source).map(|m| m.len()).unwrap_or(self.order.size);

        let response = self.library.write_to_tape(source);
        if !response.is_ok() {
            error!(
                "{}[Tape] : {}, Action : write {}, Entity: {}",
                self.library.msg_prefix(),
                tape.code,
                self.order.file_path,
                response
            );
            let status = self
                .library
                .drive_status(ReadWriteErrorCode::KoUnknownCurrentPosition)?;
            if status.is_end_of_tape() || self.over_threshold(tape) {
                return Err(ReadWriteError::new(
                    ReadWriteErrorCode::KoOnEndOfTape,
                    format!(
                        "{}[Tape] : {}, Error: end of tape after {}",
                        self.library.msg_prefix(),
                        tape.code,
                        format_bytes(tape.written_bytes)
                    ),
                ));
            }
            self.retry_write(tape, source)?;
        }

        let file_position = tape.file_count;
        tape.file_count += 1;
        tape.current_position = tape.file_count;
        tape.written_bytes += size;
        tape.state = TapeState::Open;
        persist(&self.library, self.catalog.as_ref(), &self.retry, tape)?;
        Ok(file_position)
    }

    fn over_threshold(&self, tape: &TapeCartridge) -> bool {
        self.options
            .full_cartridge_threshold_bytes
            .map(|threshold| tape.written_bytes >= threshold)
            .unwrap_or(false)
    }

    /// Reposition at the end of data and try again; a cartridge that keeps
    /// refusing the write is put in CONFLICT
    fn retry_write(&self, tape: &mut TapeCartridge, path: &Path) -> ReadWriteOutcome<()> {
        let mut last = None;
        for attempt in 1..=WRITE_RETRIES {
            let file_count = tape.file_count;
            self.library
                .rewind_tape(tape, ReadWriteErrorCode::KoUnknownCurrentPosition)?;
            self.library
                .go_to_position(tape, file_count, ReadWriteErrorCode::KoUnknownCurrentPosition)?;
            std::thread::sleep(WRITE_RETRY_DELAY);

            let response = self.library.write_to_tape(path);
            if response.is_ok() {
                return Ok(());
            }
            error!(
                "{}[Tape] : {}, Action : write retry {}/{}, Entity: {}",
                self.library.msg_prefix(),
                tape.code,
                attempt,
                WRITE_RETRIES,
                response
            );
            last = Some(response);
        }

        tape.state = TapeState::Conflict;
        if let Err(e) = persist(&self.library, self.catalog.as_ref(), &self.retry, tape) {
            error!("{}", e);
        }
        Err(ReadWriteError::new(
            ReadWriteErrorCode::KoOnWriteToTape,
            format!(
                "{}[Tape] : {}, Action : write {:?}, Entity: {}",
                self.library.msg_prefix(),
                tape.code,
                path,
                last.map(|r| r.to_string()).unwrap_or_default()
            ),
        ))
    }
}
