//! Tape Library Service
//!
//! One drive plus the robot pool of its library. Each method is one physical
//! step on a cartridge record: it issues the command and, only when the
//! command succeeds, updates the record's location or position.

pub mod error;

pub use error::{ReadWriteError, ReadWriteErrorCode, ReadWriteOutcome};

use crate::drive::{MoveDirection, ReadWriteCmd, TapeDriveService, TapeDriveState, TapeResponse};
use crate::model::{TapeCartridge, TapeLocation, TapeLocationType};
use crate::robot::{RobotLease, TapeRobotPool};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const STATUS_ATTEMPTS: u32 = 3;
const STATUS_RETRY_DELAY: Duration = Duration::from_millis(20);

#[derive(Clone)]
pub struct TapeLibraryService {
    drive: Arc<dyn TapeDriveService>,
    robots: Arc<dyn TapeRobotPool>,
    msg_prefix: String,
}

impl TapeLibraryService {
    pub fn new(drive: Arc<dyn TapeDriveService>, robots: Arc<dyn TapeRobotPool>) -> Self {
        let msg_prefix = format!(
            "[Library] : {}, [Drive] : {}, ",
            robots.library_identifier(),
            drive.drive_index()
        );
        Self {
            drive,
            robots,
            msg_prefix,
        }
    }

    pub fn drive_index(&self) -> u32 {
        self.drive.drive_index()
    }

    pub fn library_identifier(&self) -> &str {
        self.robots.library_identifier()
    }

    /// Log prefix naming the library and drive
    pub fn msg_prefix(&self) -> &str {
        &self.msg_prefix
    }

    pub fn output_directory(&self) -> PathBuf {
        self.drive.read_write_service(ReadWriteCmd::Dd).output_directory()
    }

    fn fail(
        &self,
        code: ReadWriteErrorCode,
        tape: &TapeCartridge,
        action: &str,
        response: &TapeResponse,
    ) -> ReadWriteError {
        ReadWriteError::new(
            code,
            format!(
                "{}[Tape] : {}, Action : {}, Entity: {}",
                self.msg_prefix, tape.code, action, response
            ),
        )
    }

    pub fn rewind_tape(
        &self,
        tape: &mut TapeCartridge,
        code: ReadWriteErrorCode,
    ) -> ReadWriteOutcome<()> {
        let response = self.drive.drive_command_service().rewind();
        if !response.is_ok() {
            return Err(self.fail(code, tape, "rewind", &response));
        }
        tape.current_position = 0;
        Ok(())
    }

    /// Move relative to the recorded head position; position 0 always rewinds
    pub fn go_to_position(
        &self,
        tape: &mut TapeCartridge,
        position: u32,
        code: ReadWriteErrorCode,
    ) -> ReadWriteOutcome<()> {
        if position == 0 {
            return self.rewind_tape(tape, code);
        }

        let current = tape.current_position;
        if current == position {
            debug!("{}No need to move (position={})", self.msg_prefix, position);
            return Ok(());
        }

        let (count, direction) = if position > current {
            (position - current, MoveDirection::Forward)
        } else {
            (current - position, MoveDirection::Backward)
        };

        let response = self.drive.drive_command_service().space(count, direction);
        if !response.is_ok() {
            return Err(self.fail(code, tape, "goto position", &response));
        }
        tape.current_position = position;
        Ok(())
    }

    /// Rewind, then move forward to `position`, without trusting the recorded head position
    pub fn seek_from_start(
        &self,
        tape: &mut TapeCartridge,
        position: u32,
        code: ReadWriteErrorCode,
    ) -> ReadWriteOutcome<()> {
        self.rewind_tape(tape, code)?;
        if position == 0 {
            return Ok(());
        }
        self.go_to_position(tape, position, code)
    }

    /// Read the file under the head into `output_directory()/output_name`
    pub fn read(&self, tape: &mut TapeCartridge, output_name: &str) -> ReadWriteOutcome<()> {
        let response = self
            .drive
            .read_write_service(ReadWriteCmd::Dd)
            .read_from_tape(output_name);
        if !response.is_ok() {
            return Err(self.fail(ReadWriteErrorCode::KoOnReadFromTape, tape, "read", &response));
        }
        tape.current_position += 1;
        Ok(())
    }

    /// Raw write of one file at the head position; callers own the recovery
    pub fn write_to_tape(&self, input_path: &Path) -> TapeResponse {
        self.drive
            .read_write_service(ReadWriteCmd::Dd)
            .write_to_tape(input_path)
    }

    pub fn read_label_file(&self, output_name: &str) -> TapeResponse {
        self.drive
            .read_write_service(ReadWriteCmd::Dd)
            .read_from_tape(output_name)
    }

    /// Probe one file mark forward; success means the medium has content
    pub fn probe_next_file(&self) -> TapeResponse {
        self.drive
            .drive_command_service()
            .space(1, MoveDirection::Forward)
    }

    pub fn drive_status(&self, code: ReadWriteErrorCode) -> ReadWriteOutcome<TapeDriveState> {
        let mut attempt = 1;
        loop {
            let status = self.drive.drive_command_service().status();
            if status.is_ok() {
                return Ok(status);
            }
            error!(
                "{}Action : drive status (attempt {}/{}), Entity: {}",
                self.msg_prefix, attempt, STATUS_ATTEMPTS, status.response
            );
            if attempt >= STATUS_ATTEMPTS {
                return Err(ReadWriteError::new(
                    code,
                    format!("{}Action : drive status, Entity: {}", self.msg_prefix, status.response),
                ));
            }
            attempt += 1;
            std::thread::sleep(STATUS_RETRY_DELAY);
        }
    }

    /// Move `tape` from its slot into this drive
    pub fn load_tape(&self, tape: &mut TapeCartridge) -> ReadWriteOutcome<()> {
        let drive_index = self.drive_index();
        let slot_index = tape.current_location.slot_index().ok_or_else(|| {
            ReadWriteError::new(
                ReadWriteErrorCode::TapeLocationConflictOnLoad,
                format!(
                    "{}[Tape] : {}, Error: cannot load from {}",
                    self.msg_prefix, tape.code, tape.current_location
                ),
            )
        })?;

        let lease = self.checkout_robot(tape)?;
        info!(
            "{}[Tape] : {}, Action : load from SLOT({}) into DRIVE({})",
            self.msg_prefix, tape.code, slot_index, drive_index
        );
        let response = lease.load_unload_service().load_tape(drive_index, slot_index);
        if !response.is_ok() {
            return Err(self.fail(ReadWriteErrorCode::KoOnLoadTape, tape, "load", &response));
        }

        tape.move_to(TapeLocation::drive(drive_index));
        tape.current_position = 0;
        Ok(())
    }

    /// Eject `tape` and put it back into the slot it came from
    pub fn unload_tape(&self, tape: &mut TapeCartridge) -> ReadWriteOutcome<()> {
        let drive_index = self.drive_index();
        let slot_index = match tape.previous_location {
            Some(location) => match location.location_type() {
                TapeLocationType::Slot => location.index(),
                TapeLocationType::Drive | TapeLocationType::Outside => {
                    return Err(ReadWriteError::new(
                        ReadWriteErrorCode::TapeLocationConflictOnUnload,
                        format!(
                            "{}[Tape] : {}, Error: previous location {} is not a slot",
                            self.msg_prefix, tape.code, location
                        ),
                    ));
                }
            },
            None => None,
        };
        let slot_index = slot_index.ok_or_else(|| {
            ReadWriteError::new(
                ReadWriteErrorCode::NoEmptySlotFound,
                format!(
                    "{}[Tape] : {}, Error : no slot to return to => cannot unload tape",
                    self.msg_prefix, tape.code
                ),
            )
        })?;

        let response = self.drive.drive_command_service().eject();
        if !response.is_ok() {
            return Err(self.fail(
                ReadWriteErrorCode::KoRewindBeforeUnloadTape,
                tape,
                "eject tape with forced rewind",
                &response,
            ));
        }
        tape.current_position = 0;

        let lease = self.checkout_robot(tape)?;
        info!(
            "{}[Tape] : {}, Action : unload from DRIVE({}) into SLOT({})",
            self.msg_prefix, tape.code, drive_index, slot_index
        );
        let response = lease.load_unload_service().unload_tape(drive_index, slot_index);
        if !response.is_ok() {
            return Err(self.fail(ReadWriteErrorCode::KoOnUnloadTape, tape, "unload", &response));
        }

        tape.move_to(TapeLocation::slot(slot_index));
        Ok(())
    }

    fn checkout_robot(&self, tape: &TapeCartridge) -> ReadWriteOutcome<RobotLease<'_>> {
        RobotLease::checkout(self.robots.as_ref()).map_err(|e| {
            ReadWriteError::new(
                ReadWriteErrorCode::RobotUnavailable,
                format!("{}[Tape] : {}, Error: {}", self.msg_prefix, tape.code, e),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedDrive, ScriptedRobotPool};

    fn library(drive: &Arc<ScriptedDrive>, robots: &Arc<ScriptedRobotPool>) -> TapeLibraryService {
        TapeLibraryService::new(drive.clone(), robots.clone())
    }

    #[test]
    fn test_load_updates_locations() {
        let drive = ScriptedDrive::new(0);
        let robots = ScriptedRobotPool::new("LIB");
        let mut tape = TapeCartridge::new("T1", "LIB", TapeLocation::slot(1)).with_position(4);

        library(&drive, &robots).load_tape(&mut tape).unwrap();

        assert_eq!(tape.current_location, TapeLocation::drive(0));
        assert_eq!(tape.previous_location, Some(TapeLocation::slot(1)));
        assert_eq!(tape.current_position, 0);
        assert_eq!(robots.calls(), vec!["load(0,1)"]);
    }

    #[test]
    fn test_failed_load_leaves_record_untouched() {
        let drive = ScriptedDrive::new(0);
        let robots = ScriptedRobotPool::new("LIB");
        robots.fail_next("load");
        let mut tape = TapeCartridge::new("T1", "LIB", TapeLocation::slot(1));

        let err = library(&drive, &robots).load_tape(&mut tape).unwrap_err();

        assert_eq!(err.code, ReadWriteErrorCode::KoOnLoadTape);
        assert_eq!(tape.current_location, TapeLocation::slot(1));
    }

    #[test]
    fn test_unload_requires_slot_to_return_to() {
        let drive = ScriptedDrive::new(0);
        let robots = ScriptedRobotPool::new("LIB");
        let lib = library(&drive, &robots);

        let mut homeless = TapeCartridge::new("T1", "LIB", TapeLocation::drive(0));
        assert_eq!(
            lib.unload_tape(&mut homeless).unwrap_err().code,
            ReadWriteErrorCode::NoEmptySlotFound
        );

        let mut from_outside = TapeCartridge::new("T2", "LIB", TapeLocation::drive(0))
            .with_previous_location(TapeLocation::outside());
        assert_eq!(
            lib.unload_tape(&mut from_outside).unwrap_err().code,
            ReadWriteErrorCode::TapeLocationConflictOnUnload
        );
        assert!(drive.calls().is_empty());
    }

    #[test]
    fn test_unload_ejects_then_moves_home() {
        let drive = ScriptedDrive::new(0);
        let robots = ScriptedRobotPool::new("LIB");
        let mut tape = TapeCartridge::new("T1", "LIB", TapeLocation::drive(0))
            .with_previous_location(TapeLocation::slot(2))
            .with_position(5);

        library(&drive, &robots).unload_tape(&mut tape).unwrap();

        assert_eq!(drive.calls(), vec!["eject"]);
        assert_eq!(robots.calls(), vec!["unload(0,2)"]);
        assert_eq!(tape.current_location, TapeLocation::slot(2));
        assert_eq!(tape.current_position, 0);
    }

    #[test]
    fn test_eject_failure_skips_robot() {
        let drive = ScriptedDrive::new(0);
        drive.fail_next("eject");
        let robots = ScriptedRobotPool::new("LIB");
        let mut tape = TapeCartridge::new("T1", "LIB", TapeLocation::drive(0))
            .with_previous_location(TapeLocation::slot(2));

        let err = library(&drive, &robots).unload_tape(&mut tape).unwrap_err();

        assert_eq!(err.code, ReadWriteErrorCode::KoRewindBeforeUnloadTape);
        assert!(robots.calls().is_empty());
        assert_eq!(tape.current_location, TapeLocation::drive(0));
    }

    #[test]
    fn test_go_to_position_is_relative() {
        let drive = ScriptedDrive::new(0);
        let robots = ScriptedRobotPool::new("LIB");
        let lib = library(&drive, &robots);
        let mut tape = TapeCartridge::new("T1", "LIB", TapeLocation::drive(0)).with_position(2);

        lib.go_to_position(&mut tape, 5, ReadWriteErrorCode::KoOnGoToPosition).unwrap();
        lib.go_to_position(&mut tape, 5, ReadWriteErrorCode::KoOnGoToPosition).unwrap();
        lib.go_to_position(&mut tape, 1, ReadWriteErrorCode::KoOnGoToPosition).unwrap();
        lib.go_to_position(&mut tape, 0, ReadWriteErrorCode::KoOnGoToPosition).unwrap();

        assert_eq!(
            drive.calls(),
            vec!["space(3,Forward)", "space(4,Backward)", "rewind"]
        );
        assert_eq!(tape.current_position, 0);
    }

    #[test]
    fn test_seek_from_start_rewinds_first() {
        let drive = ScriptedDrive::new(0);
        let robots = ScriptedRobotPool::new("LIB");
        let mut tape = TapeCartridge::new("T1", "LIB", TapeLocation::drive(0)).with_position(3);

        library(&drive, &robots)
            .seek_from_start(&mut tape, 3, ReadWriteErrorCode::KoOnGoToPosition)
            .unwrap();

        assert_eq!(drive.calls(), vec!["rewind", "space(3,Forward)"]);
        assert_eq!(tape.current_position, 3);
    }

    #[test]
    fn test_drive_status_retries() {
        let drive = ScriptedDrive::new(0);
        drive.fail_next("status");
        drive.fail_next("status");
        let robots = ScriptedRobotPool::new("LIB");
        let lib = library(&drive, &robots);

        assert!(lib.drive_status(ReadWriteErrorCode::KoOnStatus).is_ok());

        drive.fail_next("status");
        drive.fail_next("status");
        drive.fail_next("status");
        assert_eq!(
            lib.drive_status(ReadWriteErrorCode::KoOnStatus).unwrap_err().code,
            ReadWriteErrorCode::KoOnStatus
        );
    }
}
