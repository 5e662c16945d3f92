use super::{TapeRobotPool, TapeRobotService};
use crate::error::{Result, TapeLibraryError};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Fixed set of arms shared by the drives of one library
pub struct BlockingRobotPool {
    library: String,
    robots: Mutex<Vec<Arc<dyn TapeRobotService>>>,
    available: Condvar,
    checkout_timeout: Duration,
}

impl BlockingRobotPool {
    pub fn new(
        library: &str,
        robots: Vec<Arc<dyn TapeRobotService>>,
        checkout_timeout: Duration,
    ) -> Self {
        Self {
            library: library.to_string(),
            robots: Mutex::new(robots),
            available: Condvar::new(),
            checkout_timeout,
        }
    }

    pub fn idle_robots(&self) -> usize {
        self.robots.lock().len()
    }
}

impl TapeRobotPool for BlockingRobotPool {
    fn library_identifier(&self) -> &str {
        &self.library
    }

    fn checkout_robot_service(&self) -> Result<Arc<dyn TapeRobotService>> {
        let deadline = Instant::now() + self.checkout_timeout;
        let mut robots = self.robots.lock();
        loop {
            if let Some(robot) = robots.pop() {
                return Ok(robot);
            }
            if self.available.wait_until(&mut robots, deadline).timed_out() {
                warn!("No robot freed within {:?} in library {}", self.checkout_timeout, self.library);
                return Err(TapeLibraryError::tape_command(format!(
                    "no robot available in library {} after {:?}",
                    self.library, self.checkout_timeout
                )));
            }
        }
    }

    fn push_robot_service(&self, robot: Arc<dyn TapeRobotService>) {
        self.robots.lock().push(robot);
        self.available.notify_one();
    }
}
