use super::{SimOperation, SimState, VirtualDrive};
use crate::drive::{
    DriveStatus, MoveDirection, ReadWriteCmd, TapeDriveCommandService, TapeDriveService,
    TapeDriveState, TapeReadWriteService, TapeResponse,
};
use crate::robot::{TapeLoadUnloadService, TapeRobotService};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const CARTRIDGE_TYPE: &str = "LTO-8";

pub struct SimulatedDrive {
    index: u32,
    state: Arc<Mutex<SimState>>,
    output_directory: PathBuf,
}

impl SimulatedDrive {
    pub(crate) fn new(index: u32, state: Arc<Mutex<SimState>>, output_directory: PathBuf) -> Self {
        Self {
            index,
            state,
            output_directory,
        }
    }

    /// Run `f` on this drive's loaded, not ejected, cartridge
    fn with_drive<F>(&self, op: SimOperation, f: F) -> TapeResponse
    where
        F: FnOnce(&mut VirtualDrive, Option<u64>) -> Result<(), String>,
    {
        let mut state = self.state.lock();
        if state.take_injected(op) {
            return TapeResponse::ko(format!("injected {:?} failure on drive {}", op, self.index));
        }
        let capacity = state.capacity_bytes;
        let index = self.index as usize;
        let ready = match state.drives.get(index) {
            None => Err(format!("drive {} does not exist", self.index)),
            Some(d) if d.cartridge.is_none() => Err(format!("{:?} on empty drive {}", op, self.index)),
            Some(d) if d.ejected => Err(format!("{:?} on ejected cartridge in drive {}", op, self.index)),
            Some(_) => Ok(()),
        };
        if let Err(message) = ready {
            return TapeResponse::ko(state.misuse(message));
        }
        match state.drives.get_mut(index).map(|d| f(d, capacity)) {
            Some(Ok(())) => TapeResponse::ok(),
            Some(Err(message)) => TapeResponse::ko(message),
            None => TapeResponse::ko(format!("drive {} does not exist", self.index)),
        }
    }
}

impl TapeDriveCommandService for SimulatedDrive {
    fn status(&self) -> TapeDriveState {
        let mut state = self.state.lock();
        if state.take_injected(SimOperation::Status) {
            return TapeDriveState::failed(format!("injected status failure on drive {}", self.index));
        }
        let drive = match state.drives.get(self.index as usize) {
            Some(drive) => drive,
            None => return TapeDriveState::failed(format!("drive {} does not exist", self.index)),
        };

        let mut drive_statuses = Vec::new();
        let mut file_number = None;
        match &drive.cartridge {
            Some(cartridge) if !drive.ejected => {
                drive_statuses.push(DriveStatus::Online);
                if drive.position == 0 {
                    drive_statuses.push(DriveStatus::Bot);
                }
                if drive.position >= cartridge.files.len() {
                    drive_statuses.push(DriveStatus::Eod);
                }
                if drive.end_of_tape {
                    drive_statuses.push(DriveStatus::Eot);
                }
                file_number = Some(drive.position as u32);
            }
            _ => drive_statuses.push(DriveStatus::DrOpen),
        }

        TapeDriveState {
            response: TapeResponse::ok(),
            drive_statuses,
            cartridge: drive.cartridge.as_ref().map(|_| CARTRIDGE_TYPE.to_string()),
            file_number,
            description: drive.cartridge.as_ref().map(|c| c.code.clone()),
        }
    }

    fn rewind(&self) -> TapeResponse {
        self.with_drive(SimOperation::Rewind, |drive, _| {
            drive.position = 0;
            Ok(())
        })
    }

    fn space(&self, count: u32, direction: MoveDirection) -> TapeResponse {
        self.with_drive(SimOperation::Space, |drive, _| {
            let files = drive.cartridge.as_ref().map(|c| c.files.len()).unwrap_or(0);
            let count = count as usize;
            let target = match direction {
                MoveDirection::Forward => drive.position + count,
                MoveDirection::Backward => drive
                    .position
                    .checked_sub(count)
                    .ok_or_else(|| "beginning of tape".to_string())?,
            };
            // a blank medium has no file mark to move to
            if target > files {
                return Err(format!("end of data at file {}", files));
            }
            drive.position = target;
            Ok(())
        })
    }

    fn eject(&self) -> TapeResponse {
        self.with_drive(SimOperation::Eject, |drive, _| {
            drive.position = 0;
            drive.ejected = true;
            Ok(())
        })
    }
}

impl TapeReadWriteService for SimulatedDrive {
    fn read_from_tape(&self, output_name: &str) -> TapeResponse {
        let target = self.output_directory.join(output_name);
        let mut content = None;
        let response = self.with_drive(SimOperation::Read, |drive, _| {
            let file = drive
                .cartridge
                .as_ref()
                .and_then(|c| c.files.get(drive.position))
                .cloned()
                .ok_or_else(|| format!("no file at position {}", drive.position))?;
            drive.position += 1;
            content = Some(file);
            Ok(())
        });

        let content = match content {
            Some(content) => content,
            None if response.is_ok() => return TapeResponse::ko("nothing read"),
            None => {
                if response.message().starts_with("no file") {
                    self.state.lock().misuse(format!(
                        "read past end of data in drive {}",
                        self.index
                    ));
                }
                return response;
            }
        };
        let written = fs::create_dir_all(&self.output_directory).and_then(|_| fs::write(&target, content));
        match written {
            Ok(()) => {
                debug!("Drive {} staged {:?}", self.index, target);
                TapeResponse::ok()
            }
            Err(e) => TapeResponse::ko(format!("cannot stage {:?}: {}", target, e)),
        }
    }

    fn write_to_tape(&self, input_path: &Path) -> TapeResponse {
        let content = match fs::read(input_path) {
            Ok(content) => content,
            Err(e) => return TapeResponse::ko(format!("cannot read {:?}: {}", input_path, e)),
        };
        self.with_drive(SimOperation::Write, move |drive, capacity| {
            let position = drive.position;
            let cartridge = drive
                .cartridge
                .as_mut()
                .ok_or_else(|| "no cartridge".to_string())?;
            // appending at a position drops everything after it
            cartridge.files.truncate(position);
            if let Some(capacity) = capacity {
                if cartridge.used_bytes() + content.len() as u64 > capacity {
                    drive.end_of_tape = true;
                    return Err(format!("end of tape on {}", cartridge.code));
                }
            }
            cartridge.files.push(content);
            drive.position = cartridge.files.len();
            Ok(())
        })
    }

    fn output_directory(&self) -> PathBuf {
        self.output_directory.clone()
    }
}

impl TapeDriveService for SimulatedDrive {
    fn drive_index(&self) -> u32 {
        self.index
    }

    fn drive_command_service(&self) -> &dyn TapeDriveCommandService {
        self
    }

    fn read_write_service(&self, _mode: ReadWriteCmd) -> &dyn TapeReadWriteService {
        self
    }
}

pub struct SimulatedRobot {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedRobot {
    pub(crate) fn new(state: Arc<Mutex<SimState>>) -> Self {
        Self { state }
    }
}

impl TapeLoadUnloadService for SimulatedRobot {
    fn load_tape(&self, drive_index: u32, slot_index: u32) -> TapeResponse {
        let mut state = self.state.lock();
        if state.take_injected(SimOperation::Load) {
            return TapeResponse::ko(format!("injected load failure SLOT({}) -> DRIVE({})", slot_index, drive_index));
        }
        let drive_free = state
            .drives
            .get(drive_index as usize)
            .map(|d| d.cartridge.is_none());
        let cartridge = state.slots.get(&slot_index).and_then(|c| c.as_ref()).is_some();
        match (drive_free, cartridge) {
            (None, _) => return TapeResponse::ko(state.misuse(format!("no drive {}", drive_index))),
            (Some(false), _) => {
                return TapeResponse::ko(state.misuse(format!("load into occupied drive {}", drive_index)))
            }
            (_, false) => {
                return TapeResponse::ko(state.misuse(format!("load from empty slot {}", slot_index)))
            }
            (Some(true), true) => {}
        }

        let SimState { drives, slots, .. } = &mut *state;
        let cartridge = slots.get_mut(&slot_index).and_then(|c| c.take());
        if let Some(drive) = drives.get_mut(drive_index as usize) {
            debug!("Robot moved cartridge SLOT({}) -> DRIVE({})", slot_index, drive_index);
            *drive = VirtualDrive {
                cartridge,
                ..VirtualDrive::default()
            };
        }
        TapeResponse::ok()
    }

    fn unload_tape(&self, drive_index: u32, slot_index: u32) -> TapeResponse {
        let mut state = self.state.lock();
        if state.take_injected(SimOperation::Unload) {
            return TapeResponse::ko(format!("injected unload failure DRIVE({}) -> SLOT({})", drive_index, slot_index));
        }
        let drive = state
            .drives
            .get(drive_index as usize)
            .map(|d| (d.cartridge.is_some(), d.ejected));
        let slot_free = state.slots.get(&slot_index).map(|c| c.is_none());
        match (drive, slot_free) {
            (None, _) | (Some((false, _)), _) => {
                return TapeResponse::ko(state.misuse(format!("unload from empty drive {}", drive_index)))
            }
            (Some((true, false)), _) => {
                return TapeResponse::ko(state.misuse(format!("unload before eject in drive {}", drive_index)))
            }
            (_, None) => return TapeResponse::ko(state.misuse(format!("no slot {}", slot_index))),
            (_, Some(false)) => {
                return TapeResponse::ko(state.misuse(format!("unload into occupied slot {}", slot_index)))
            }
            (Some((true, true)), Some(true)) => {}
        }

        let SimState { drives, slots, .. } = &mut *state;
        if let Some(drive) = drives.get_mut(drive_index as usize) {
            let cartridge = drive.cartridge.take();
            *drive = VirtualDrive::default();
            slots.insert(slot_index, cartridge);
            debug!("Robot moved cartridge DRIVE({}) -> SLOT({})", drive_index, slot_index);
        }
        TapeResponse::ok()
    }
}

impl TapeRobotService for SimulatedRobot {
    fn load_unload_service(&self) -> &dyn TapeLoadUnloadService {
        self
    }
}
