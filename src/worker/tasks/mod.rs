//! Read and write tasks
//!
//! A task executes one order against one drive and classifies the outcome
//! into a `ReadWriteResult`. Every failure is converted locally, nothing
//! escapes `run`.

pub mod read_task;
pub mod write_task;

pub use read_task::ReadTask;
pub use write_task::{WriteTask, WriteTaskOptions};

use crate::catalog::TapeCatalogService;
use crate::library::{ReadWriteError, ReadWriteErrorCode, ReadWriteOutcome, TapeLibraryService};
use crate::model::{TapeCartridge, TapeCartridgeLabel};
use crate::utils::RetryPolicy;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Name prefix of label files staged on disk
pub const TAPE_LABEL_PREFIX: &str = "tape-label-";

/// Persist `tape`, keeping it checked out
pub(crate) fn persist(
    library: &TapeLibraryService,
    catalog: &dyn TapeCatalogService,
    retry: &RetryPolicy,
    tape: &TapeCartridge,
) -> ReadWriteOutcome<()> {
    retry
        .run("catalog replace", || catalog.replace(tape))
        .map_err(|e| {
            ReadWriteError::new(
                ReadWriteErrorCode::KoDbPersist,
                format!("{}[Tape] : {}, Error: {}", library.msg_prefix(), tape.code, e),
            )
        })
}

/// Persist `tape` and hand it back to the idle pool
pub(crate) fn release(
    library: &TapeLibraryService,
    catalog: &dyn TapeCatalogService,
    retry: &RetryPolicy,
    tape: &TapeCartridge,
) -> ReadWriteOutcome<()> {
    retry
        .run("catalog release", || catalog.release(tape))
        .map_err(|e| {
            ReadWriteError::new(
                ReadWriteErrorCode::KoDbPersist,
                format!("{}[Tape] : {}, Error: {}", library.msg_prefix(), tape.code, e),
            )
        })
}

/// Release a cartridge the task checked out but will not use
pub(crate) fn release_unused(
    library: &TapeLibraryService,
    catalog: &dyn TapeCatalogService,
    retry: &RetryPolicy,
    tape: &TapeCartridge,
) {
    if let Err(e) = release(library, catalog, retry, tape) {
        warn!("{}Cartridge {} stays checked out: {}", library.msg_prefix(), tape.code, e);
    }
}

/// Eject and unload the mounted cartridge to its home slot, then release it.
///
/// On a physical failure `tape` is left as it was before the call.
pub(crate) fn unload_current(
    library: &TapeLibraryService,
    catalog: &dyn TapeCatalogService,
    retry: &RetryPolicy,
    tape: &TapeCartridge,
) -> ReadWriteOutcome<TapeCartridge> {
    let mut unloaded = tape.clone();
    library.unload_tape(&mut unloaded)?;
    info!(
        "{}[Tape] : {}, Action : unloaded to {}",
        library.msg_prefix(),
        unloaded.code,
        unloaded.current_location
    );
    release(library, catalog, retry, &unloaded)?;
    Ok(unloaded)
}

/// Read file 0 of the rewound cartridge and check it carries `expected`.
///
/// Leaves the head after the label (`current_position = 1`) on success.
pub(crate) fn verify_label(
    library: &TapeLibraryService,
    tape: &mut TapeCartridge,
    expected: &TapeCartridgeLabel,
) -> ReadWriteOutcome<()> {
    let name = format!("{}{}", TAPE_LABEL_PREFIX, Uuid::new_v4());
    let response = library.read_label_file(&name);
    let path = library.output_directory().join(&name);
    let outcome = if response.is_ok() {
        compare_label(library, tape, &path, expected)
    } else {
        Err(ReadWriteError::new(
            ReadWriteErrorCode::KoOnReadLabel,
            format!(
                "{}[Tape] : {}, Action : read label, Entity: {}",
                library.msg_prefix(),
                tape.code,
                response
            ),
        ))
    };
    if path.exists() {
        if let Err(e) = fs::remove_file(&path) {
            debug!("Could not remove {:?}: {}", path, e);
        }
    }
    outcome?;
    tape.current_position = 1;
    Ok(())
}

fn compare_label(
    library: &TapeLibraryService,
    tape: &TapeCartridge,
    path: &Path,
    expected: &TapeCartridgeLabel,
) -> ReadWriteOutcome<()> {
    let on_tape: Option<TapeCartridgeLabel> = fs::read(path)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok());
    match on_tape {
        Some(label) if label.id == expected.id => Ok(()),
        found => Err(ReadWriteError::new(
            ReadWriteErrorCode::KoLabelDiscording,
            format!(
                "{}[Tape] : {}, Action : check label, Error: expected id {}, found {:?}",
                library.msg_prefix(),
                tape.code,
                expected.id,
                found.map(|l| l.id)
            ),
        )),
    }
}
