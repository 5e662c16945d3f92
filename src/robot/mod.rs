//! Robot / Loader Contracts
//!
//! Robotic arms move cartridges between slots and drives. Arms are shared by
//! every drive of a library, so they are checked out of a pool for the length
//! of one move.

pub mod pool;

pub use pool::BlockingRobotPool;

use crate::drive::TapeResponse;
use crate::error::Result;
use std::sync::Arc;
use tracing::debug;

pub trait TapeLoadUnloadService: Send + Sync {
    /// Move the cartridge in `slot_index` into `drive_index`
    fn load_tape(&self, drive_index: u32, slot_index: u32) -> TapeResponse;

    /// Move the (ejected) cartridge in `drive_index` back into `slot_index`
    fn unload_tape(&self, drive_index: u32, slot_index: u32) -> TapeResponse;
}

pub trait TapeRobotService: Send + Sync {
    fn load_unload_service(&self) -> &dyn TapeLoadUnloadService;
}

pub trait TapeRobotPool: Send + Sync {
    fn library_identifier(&self) -> &str;

    /// Block until an arm is free and take it
    fn checkout_robot_service(&self) -> Result<Arc<dyn TapeRobotService>>;

    fn push_robot_service(&self, robot: Arc<dyn TapeRobotService>);
}

/// A checked-out arm, handed back to its pool on drop
pub struct RobotLease<'a> {
    pool: &'a dyn TapeRobotPool,
    robot: Arc<dyn TapeRobotService>,
}

impl<'a> RobotLease<'a> {
    pub fn checkout(pool: &'a dyn TapeRobotPool) -> Result<Self> {
        let robot = pool.checkout_robot_service()?;
        debug!("Robot checked out from library {}", pool.library_identifier());
        Ok(Self { pool, robot })
    }

    pub fn load_unload_service(&self) -> &dyn TapeLoadUnloadService {
        self.robot.load_unload_service()
    }
}

impl Drop for RobotLease<'_> {
    fn drop(&mut self) {
        self.pool.push_robot_service(Arc::clone(&self.robot));
        debug!("Robot returned to library {}", self.pool.library_identifier());
    }
}
