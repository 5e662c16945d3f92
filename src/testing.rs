//! Scripted stand-ins for the drive and robot contracts.
//!
//! Every command succeeds unless a failure was queued with `fail_next`, and
//! every call is recorded so tests can assert the physical command order.

use crate::drive::{
    DriveStatus, MoveDirection, ReadWriteCmd, TapeDriveCommandService, TapeDriveService,
    TapeDriveState, TapeReadWriteService, TapeResponse,
};
use crate::error::{Result, TapeLibraryError};
use crate::robot::{TapeLoadUnloadService, TapeRobotPool, TapeRobotService};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Default)]
struct Script {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, u32>>,
}

impl Script {
    fn record(&self, op: &str, call: String) -> TapeResponse {
        self.calls.lock().push(call);
        let mut failures = self.failures.lock();
        match failures.get_mut(op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                TapeResponse::ko(format!("scripted {} failure", op))
            }
            _ => TapeResponse::ok(),
        }
    }

    fn fail_next(&self, op: &str) {
        *self.failures.lock().entry(op.to_string()).or_insert(0) += 1;
    }
}

pub struct ScriptedDrive {
    index: u32,
    script: Script,
    output: TempDir,
    payloads: Mutex<VecDeque<Vec<u8>>>,
    extra_statuses: Mutex<Vec<DriveStatus>>,
}

impl ScriptedDrive {
    pub fn new(index: u32) -> Arc<Self> {
        Arc::new(Self {
            index,
            script: Script::default(),
            output: TempDir::new().expect("temp dir"),
            payloads: Mutex::new(VecDeque::new()),
            extra_statuses: Mutex::new(Vec::new()),
        })
    }

    /// Queue a failure for the next call of `op`
    /// ("rewind", "space", "eject", "status", "read", "write")
    pub fn fail_next(&self, op: &str) {
        self.script.fail_next(op);
    }

    /// Content produced by the next successful read (defaults to `data`)
    pub fn push_payload(&self, payload: &[u8]) {
        self.payloads.lock().push_back(payload.to_vec());
    }

    pub fn report_status(&self, status: DriveStatus) {
        self.extra_statuses.lock().push(status);
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.calls.lock().clone()
    }
}

impl TapeDriveCommandService for ScriptedDrive {
    fn status(&self) -> TapeDriveState {
        let response = self.script.record("status", "status".to_string());
        if !response.is_ok() {
            return TapeDriveState::failed(response.message());
        }
        let mut drive_statuses = vec![DriveStatus::Online];
        drive_statuses.extend(self.extra_statuses.lock().iter().copied());
        TapeDriveState {
            response,
            drive_statuses,
            cartridge: Some("LTO-6".to_string()),
            file_number: None,
            description: Some(format!("DRIVE-{}", self.index)),
        }
    }

    fn rewind(&self) -> TapeResponse {
        self.script.record("rewind", "rewind".to_string())
    }

    fn space(&self, count: u32, direction: MoveDirection) -> TapeResponse {
        self.script
            .record("space", format!("space({},{:?})", count, direction))
    }

    fn eject(&self) -> TapeResponse {
        self.script.record("eject", "eject".to_string())
    }
}

impl TapeReadWriteService for ScriptedDrive {
    fn read_from_tape(&self, output_name: &str) -> TapeResponse {
        let response = self.script.record("read", format!("read({})", output_name));
        if response.is_ok() {
            let payload = self
                .payloads
                .lock()
                .pop_front()
                .unwrap_or_else(|| b"data".to_vec());
            std::fs::write(self.output.path().join(output_name), payload).expect("write payload");
        }
        response
    }

    fn write_to_tape(&self, input_path: &Path) -> TapeResponse {
        let name = input_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.script.record("write", format!("write({})", name))
    }

    fn output_directory(&self) -> PathBuf {
        self.output.path().to_path_buf()
    }
}

impl TapeDriveService for ScriptedDrive {
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

#[derive(Default)]
pub struct ScriptedRobot {
    script: Script,
}

impl TapeLoadUnloadService for ScriptedRobot {
    fn load_tape(&self, drive_index: u32, slot_index: u32) -> TapeResponse {
        self.script
            .record("load", format!("load({},{})", drive_index, slot_index))
    }

    fn unload_tape(&self, drive_index: u32, slot_index: u32) -> TapeResponse {
        self.script
            .record("unload", format!("unload({},{})", drive_index, slot_index))
    }
}

impl TapeRobotService for ScriptedRobot {
    fn load_unload_service(&self) -> &dyn TapeLoadUnloadService {
        self
    }
}

pub struct ScriptedRobotPool {
    library: String,
    robot: Arc<ScriptedRobot>,
    unavailable: AtomicBool,
}

impl ScriptedRobotPool {
    pub fn new(library: &str) -> Arc<Self> {
        Arc::new(Self {
            library: library.to_string(),
            robot: Arc::new(ScriptedRobot::default()),
            unavailable: AtomicBool::new(false),
        })
    }

    /// Queue a failure for the next "load" or "unload"
    pub fn fail_next(&self, op: &str) {
        self.robot.script.fail_next(op);
    }

    pub fn set_unavailable(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.robot.script.calls.lock().clone()
    }
}

impl TapeRobotPool for ScriptedRobotPool {
    fn library_identifier(&self) -> &str {
        &self.library
    }

    fn checkout_robot_service(&self) -> Result<Arc<dyn TapeRobotService>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TapeLibraryError::tape_command("no robot available"));
        }
        Ok(self.robot.clone())
    }

    fn push_robot_service(&self, _robot: Arc<dyn TapeRobotService>) {}
}
