use std::fmt;
use thiserror::Error;

/// Why a read or write task could not complete.
///
/// Tasks turn each code into a `ReadWriteResult`, nothing else leaves a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadWriteErrorCode {
    CatalogAccess,
    KoDbPersist,
    TapeNotFoundInCatalog,
    TapeBusyInCatalog,
    TapeLocationUnknown,
    TapeLocationConflictOnLoad,
    TapeLocationConflictOnUnload,
    NoEmptySlotFound,
    RobotUnavailable,
    KoRewindBeforeUnloadTape,
    KoOnUnloadTape,
    KoOnLoadTape,
    KoOnRewindTape,
    KoOnGoToPosition,
    KoOnGotoFileCount,
    KoOnReadFromTape,
    KoOnWriteToTape,
    KoOnEndOfTape,
    KoOnStatus,
    KoOnReadLabel,
    KoLabelDiscording,
    KoLabelDiscordingNotEmptyTape,
    KoRewindBeforeForceOverrideNonEmptyTape,
    KoTapeCurrentPositionGreaterThanFileCount,
    KoUnknownCurrentPosition,
    NullCurrentTape,
    FileNotFound,
    InternalError,
}

impl fmt::Display for ReadWriteErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ReadWriteError {
    pub code: ReadWriteErrorCode,
    pub message: String,
}

impl ReadWriteError {
    pub fn new<T: Into<String>>(code: ReadWriteErrorCode, message: T) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

pub type ReadWriteOutcome<T> = std::result::Result<T, ReadWriteError>;
