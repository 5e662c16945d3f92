//! Tape Drive Contracts
//!
//! Command facades over one physical drive. Every call blocks until the
//! device answers and reports failure through its return value; a failed
//! command is never assumed to be idempotent.

pub mod types;

pub use types::{DriveStatus, MoveDirection, ReadWriteCmd, TapeDriveState, TapeResponse};

use std::path::{Path, PathBuf};

/// Positioning and mechanical control of the drive
pub trait TapeDriveCommandService: Send + Sync {
    fn status(&self) -> TapeDriveState;

    fn rewind(&self) -> TapeResponse;

    /// Move the head `count` file marks in `direction` (SCSI SPACE)
    fn space(&self, count: u32, direction: MoveDirection) -> TapeResponse;

    /// Rewind and push the cartridge out of the drive so the robot can take it
    fn eject(&self) -> TapeResponse;
}

/// Data path of the drive
pub trait TapeReadWriteService: Send + Sync {
    /// Copy the file at the current head position into
    /// `output_directory()/output_name`, advancing one file mark
    fn read_from_tape(&self, output_name: &str) -> TapeResponse;

    /// Append `input_path` as one new file at the current head position
    fn write_to_tape(&self, input_path: &Path) -> TapeResponse;

    fn output_directory(&self) -> PathBuf;
}

pub trait TapeDriveService: Send + Sync {
    fn drive_index(&self) -> u32;

    fn drive_command_service(&self) -> &dyn TapeDriveCommandService;

    fn read_write_service(&self, mode: ReadWriteCmd) -> &dyn TapeReadWriteService;
}
