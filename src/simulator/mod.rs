//! Tape Library Simulator
//!
//! In-memory drives, slots and cartridges behind the drive and robot
//! contracts. Cartridges hold their files in memory, drives stage reads into
//! a real output directory and take writes from real files.
//!
//! Failures can be injected per operation. Misuse that a real library would
//! refuse (loading from an empty slot, reading past end of data, ...) is
//! answered with KO and kept in [`TapeLibrarySimulator::failures`].

mod devices;

pub use devices::{SimulatedDrive, SimulatedRobot};

use crate::error::{Result, TapeLibraryError};
use crate::model::{TapeCartridge, TapeLocation};
use crate::robot::{BlockingRobotPool, TapeRobotService};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOperation {
    Load,
    Unload,
    Eject,
    Rewind,
    Space,
    Read,
    Write,
    Status,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct VirtualCartridge {
    pub code: String,
    pub files: Vec<Vec<u8>>,
}

impl VirtualCartridge {
    pub fn used_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.len() as u64).sum()
    }
}

#[derive(Debug, Default)]
pub(crate) struct VirtualDrive {
    pub cartridge: Option<VirtualCartridge>,
    pub position: usize,
    pub ejected: bool,
    pub end_of_tape: bool,
}

#[derive(Debug, Default)]
pub(crate) struct SimState {
    pub drives: Vec<VirtualDrive>,
    pub slots: BTreeMap<u32, Option<VirtualCartridge>>,
    pub injected: HashMap<SimOperation, u32>,
    pub failures: Vec<String>,
    pub capacity_bytes: Option<u64>,
}

impl SimState {
    /// Consume one injected failure for `op`, if any
    pub fn take_injected(&mut self, op: SimOperation) -> bool {
        match self.injected.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                debug!("Injected {:?} failure", op);
                true
            }
            _ => false,
        }
    }

    pub fn misuse(&mut self, message: String) -> String {
        warn!("Simulated library refused: {}", message);
        self.failures.push(message.clone());
        message
    }
}

pub struct TapeLibrarySimulator {
    library: String,
    state: Arc<Mutex<SimState>>,
    output_directory: PathBuf,
}

impl TapeLibrarySimulator {
    /// `cartridges` cartridges `TAPE-<n>` sit in slots 1..=cartridges
    pub fn new<P: AsRef<Path>>(
        library: &str,
        drive_count: u32,
        slot_count: u32,
        cartridge_count: u32,
        output_directory: P,
    ) -> Result<Self> {
        if cartridge_count > slot_count {
            return Err(TapeLibraryError::config(format!(
                "{} cartridges do not fit in {} slots",
                cartridge_count, slot_count
            )));
        }
        let output_directory = output_directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_directory)?;

        let slots = (1..=slot_count)
            .map(|slot| {
                let cartridge = (slot <= cartridge_count).then(|| VirtualCartridge {
                    code: Self::cartridge_code(slot),
                    files: Vec::new(),
                });
                (slot, cartridge)
            })
            .collect();
        let state = SimState {
            drives: (0..drive_count).map(|_| VirtualDrive::default()).collect(),
            slots,
            ..SimState::default()
        };

        Ok(Self {
            library: library.to_string(),
            state: Arc::new(Mutex::new(state)),
            output_directory,
        })
    }

    pub fn with_capacity(self, capacity_bytes: Option<u64>) -> Self {
        self.state.lock().capacity_bytes = capacity_bytes;
        self
    }

    pub fn cartridge_code(slot: u32) -> String {
        format!("TAPE-{}", slot)
    }

    pub fn library_identifier(&self) -> &str {
        &self.library
    }

    pub fn drive_count(&self) -> u32 {
        self.state.lock().drives.len() as u32
    }

    pub fn drive(&self, index: u32) -> Arc<SimulatedDrive> {
        Arc::new(SimulatedDrive::new(
            index,
            Arc::clone(&self.state),
            self.output_directory.join(format!("drive-{}", index)),
        ))
    }

    pub fn robot_pool(&self, robot_count: u32, checkout_timeout: Duration) -> BlockingRobotPool {
        let robots = (0..robot_count.max(1))
            .map(|_| Arc::new(SimulatedRobot::new(Arc::clone(&self.state))) as Arc<dyn TapeRobotService>)
            .collect();
        BlockingRobotPool::new(&self.library, robots, checkout_timeout)
    }

    /// Catalog records matching the simulated library as built
    pub fn initial_catalog(&self) -> Vec<TapeCartridge> {
        self.state
            .lock()
            .slots
            .iter()
            .filter_map(|(slot, cartridge)| {
                cartridge
                    .as_ref()
                    .map(|c| TapeCartridge::new(&c.code, &self.library, TapeLocation::slot(*slot)))
            })
            .collect()
    }

    /// Make the next `count` calls of `op` fail
    pub fn inject_failure(&self, op: SimOperation, count: u32) {
        *self.state.lock().injected.entry(op).or_insert(0) += count;
    }

    pub fn failures(&self) -> Vec<String> {
        self.state.lock().failures.clone()
    }

    /// Which cartridge each location holds, for inspection
    pub fn location_of(&self, code: &str) -> Option<TapeLocation> {
        let state = self.state.lock();
        let in_drive = state.drives.iter().position(|d| {
            d.cartridge.as_ref().map(|c| c.code == code).unwrap_or(false)
        });
        if let Some(index) = in_drive {
            return Some(TapeLocation::drive(index as u32));
        }
        state.slots.iter().find_map(|(slot, c)| {
            c.as_ref()
                .filter(|c| c.code == code)
                .map(|_| TapeLocation::slot(*slot))
        })
    }

    /// Files recorded on a cartridge, wherever it is
    pub fn file_count(&self, code: &str) -> Option<usize> {
        let state = self.state.lock();
        state
            .drives
            .iter()
            .filter_map(|d| d.cartridge.as_ref())
            .chain(state.slots.values().filter_map(|c| c.as_ref()))
            .find(|c| c.code == code)
            .map(|c| c.files.len())
    }

    /// Put a file on a cartridge directly, as if written by another system
    pub fn preload(&self, code: &str, content: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        let SimState { drives, slots, .. } = &mut *state;
        let cartridge = drives
            .iter_mut()
            .filter_map(|d| d.cartridge.as_mut())
            .chain(slots.values_mut().filter_map(|c| c.as_mut()))
            .find(|c| c.code == code)
            .ok_or_else(|| TapeLibraryError::tape_command(format!("no cartridge {}", code)))?;
        cartridge.files.push(content.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::{MoveDirection, ReadWriteCmd, TapeDriveService};
    use crate::robot::TapeRobotPool;
    use tempfile::TempDir;

    fn simulator(dir: &TempDir) -> TapeLibrarySimulator {
        TapeLibrarySimulator::new("SIM", 2, 4, 3, dir.path()).unwrap()
    }

    #[test]
    fn test_initial_catalog_matches_slots() {
        let dir = TempDir::new().unwrap();
        let sim = simulator(&dir);
        let catalog = sim.initial_catalog();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog[0].code, "TAPE-1");
        assert_eq!(catalog[2].current_location, TapeLocation::slot(3));
        assert!(catalog.iter().all(|t| t.library == "SIM"));
        assert!(TapeLibrarySimulator::new("SIM", 1, 2, 3, dir.path()).is_err());
    }

    #[test]
    fn test_load_write_read_unload_cycle() {
        let dir = TempDir::new().unwrap();
        let sim = simulator(&dir);
        let drive = sim.drive(0);
        let pool = sim.robot_pool(1, Duration::from_millis(10));
        let robot = pool.checkout_robot_service().unwrap();
        let source = dir.path().join("in.bin");
        std::fs::write(&source, b"hello").unwrap();

        assert!(robot.load_unload_service().load_tape(0, 1).is_ok());
        assert_eq!(sim.location_of("TAPE-1"), Some(TapeLocation::drive(0)));
        let rw = drive.read_write_service(ReadWriteCmd::Dd);
        assert!(rw.write_to_tape(&source).is_ok());
        assert!(drive.drive_command_service().rewind().is_ok());
        assert!(rw.read_from_tape("out.bin").is_ok());
        assert_eq!(std::fs::read(rw.output_directory().join("out.bin")).unwrap(), b"hello");

        // past end of data
        assert!(!rw.read_from_tape("none.bin").is_ok());
        assert!(!drive.drive_command_service().space(1, MoveDirection::Forward).is_ok());

        assert!(drive.drive_command_service().eject().is_ok());
        assert!(robot.load_unload_service().unload_tape(0, 1).is_ok());
        assert_eq!(sim.location_of("TAPE-1"), Some(TapeLocation::slot(1)));
        assert_eq!(sim.file_count("TAPE-1"), Some(1));
        assert_eq!(sim.failures().len(), 1);
    }

    #[test]
    fn test_misuse_is_refused_and_reported() {
        let dir = TempDir::new().unwrap();
        let sim = simulator(&dir);
        let pool = sim.robot_pool(1, Duration::from_millis(10));
        let robot = pool.checkout_robot_service().unwrap();

        // slot 4 is empty
        assert!(!robot.load_unload_service().load_tape(0, 4).is_ok());
        assert!(robot.load_unload_service().load_tape(0, 1).is_ok());
        // drive already full
        assert!(!robot.load_unload_service().load_tape(0, 2).is_ok());
        // not ejected yet
        assert!(!robot.load_unload_service().unload_tape(0, 4).is_ok());
        assert_eq!(sim.failures().len(), 3);
        assert!(!sim.drive(1).drive_command_service().rewind().is_ok());
    }

    #[test]
    fn test_injected_failures_are_consumed() {
        let dir = TempDir::new().unwrap();
        let sim = simulator(&dir);
        let pool = sim.robot_pool(1, Duration::from_millis(10));
        let robot = pool.checkout_robot_service().unwrap();
        sim.inject_failure(SimOperation::Load, 1);

        assert!(!robot.load_unload_service().load_tape(0, 1).is_ok());
        assert!(robot.load_unload_service().load_tape(0, 1).is_ok());
        assert!(sim.failures().is_empty());
    }

    #[test]
    fn test_capacity_reports_end_of_tape() {
        let dir = TempDir::new().unwrap();
        let sim = simulator(&dir).with_capacity(Some(8));
        let drive = sim.drive(0);
        let pool = sim.robot_pool(1, Duration::from_millis(10));
        assert!(pool
            .checkout_robot_service()
            .unwrap()
            .load_unload_service()
            .load_tape(0, 1)
            .is_ok());
        let source = dir.path().join("big.bin");
        std::fs::write(&source, b"0123456789").unwrap();

        assert!(!drive.read_write_service(ReadWriteCmd::Dd).write_to_tape(&source).is_ok());
        assert!(drive.drive_command_service().status().is_end_of_tape());
    }
}
