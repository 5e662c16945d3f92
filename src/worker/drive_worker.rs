use super::queue::{OrderQueue, QueuedOrder, TapeOrder};
use super::tasks::{ReadTask, WriteTask, WriteTaskOptions};
use crate::catalog::{CatalogCriteria, TapeCatalogService};
use crate::library::TapeLibraryService;
use crate::model::{QueueState, ReadWriteResult, StatusCode, TapeCartridge, TapeLocation};
use crate::referential::{ArchiveReferential, ReadRequestRepository};
use crate::retention::RetentionPolicy;
use crate::utils::RetryPolicy;
use crossbeam::channel::Sender;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Collaborators shared by every worker of a library
#[derive(Clone)]
pub struct WorkerServices {
    pub catalog: Arc<dyn TapeCatalogService>,
    pub read_requests: Arc<dyn ReadRequestRepository>,
    pub retention: Arc<dyn RetentionPolicy>,
    pub archive_referential: Arc<dyn ArchiveReferential>,
    pub write_options: WriteTaskOptions,
    pub retry: RetryPolicy,
    pub max_attempts: u32,
}

/// One attempt at one order, as reported by a worker
#[derive(Debug, Clone, Serialize)]
pub struct OrderOutcome {
    pub order_id: u64,
    pub order: TapeOrder,
    pub attempt: u32,
    pub drive_index: u32,
    pub result: ReadWriteResult,
    /// Whether the order went back to the queue
    pub requeued: bool,
}

pub struct TapeDriveWorker {
    library: TapeLibraryService,
    services: WorkerServices,
    queue: Arc<OrderQueue>,
    outcomes: Sender<OrderOutcome>,
    current_tape: Option<TapeCartridge>,
}

impl TapeDriveWorker {
    pub fn new(
        library: TapeLibraryService,
        services: WorkerServices,
        queue: Arc<OrderQueue>,
        outcomes: Sender<OrderOutcome>,
    ) -> Self {
        Self {
            library,
            services,
            queue,
            outcomes,
            current_tape: None,
        }
    }

    /// Start from a known mounted cartridge instead of asking the catalog
    pub fn with_current_tape(mut self, tape: Option<TapeCartridge>) -> Self {
        self.current_tape = tape;
        self
    }

    /// Drain the queue; returns the cartridge left in the drive
    pub fn run(mut self) -> Option<TapeCartridge> {
        info!("{}Drive worker started", self.library.msg_prefix());
        if self.current_tape.is_none() {
            self.reconcile();
        }

        while let Some(mut queued) = self.queue.pop() {
            queued.attempts += 1;
            let result = self.execute(&queued);

            self.current_tape = result.current_tape.clone();
            if self.current_tape.is_none() {
                self.reconcile();
            }

            let requeued =
                result.is_retryable() && queued.attempts < self.services.max_attempts;
            if result.is_retryable() && !requeued {
                warn!(
                    "{}Order {} gave up after {} attempts",
                    self.library.msg_prefix(),
                    queued.id,
                    queued.attempts
                );
            }

            let outcome = OrderOutcome {
                order_id: queued.id,
                order: queued.order.clone(),
                attempt: queued.attempts,
                drive_index: self.library.drive_index(),
                result,
                requeued,
            };
            if self.outcomes.send(outcome).is_err() {
                debug!("{}Outcome receiver is gone", self.library.msg_prefix());
            }
            if requeued {
                self.queue.requeue(queued);
            }
        }

        info!(
            "{}Drive worker stopped, current tape: {}",
            self.library.msg_prefix(),
            self.current_tape
                .as_ref()
                .map(|t| t.code.as_str())
                .unwrap_or("none")
        );
        self.current_tape
    }

    fn execute(&self, queued: &QueuedOrder) -> ReadWriteResult {
        let services = &self.services;
        let current = self.current_tape.clone();
        let built = match &queued.order {
            TapeOrder::Read(order) => ReadTask::new(
                order.clone(),
                current,
                self.library.clone(),
                services.catalog.clone(),
                services.read_requests.clone(),
                services.retention.clone(),
            )
            .map(|task| task.with_retry_policy(services.retry).run()),
            TapeOrder::Write(order) => WriteTask::new(
                order.clone(),
                current,
                self.library.clone(),
                services.catalog.clone(),
                services.archive_referential.clone(),
                services.write_options.clone(),
            )
            .map(|task| task.with_retry_policy(services.retry).run()),
        };

        built.unwrap_or_else(|e| {
            error!("{}Order {} rejected: {}", self.library.msg_prefix(), queued.id, e);
            ReadWriteResult::new(StatusCode::Fatal, QueueState::Error, self.current_tape.clone())
        })
    }

    /// Recover the drive's contents from the catalog after a task lost track of them
    fn reconcile(&mut self) {
        let here = CatalogCriteria::at_location(TapeLocation::drive(self.library.drive_index()));
        let catalog = self.services.catalog.as_ref();
        // claim it when idle, otherwise it is still checked out on our behalf
        let found = match catalog.receive(&here) {
            Ok(Some(tape)) => Ok(Some(tape)),
            Ok(None) => catalog.find(&here).map(|found| found.into_iter().next()),
            Err(e) => Err(e),
        };
        match found {
            Ok(tape) => {
                if let Some(tape) = &tape {
                    debug!(
                        "{}Catalog places {} in this drive",
                        self.library.msg_prefix(),
                        tape.code
                    );
                }
                self.current_tape = tape;
            }
            Err(e) => warn!("{}Cannot reconcile drive contents: {}", self.library.msg_prefix(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryTapeCatalog;
    use crate::model::{ReadOrder, WriteOrder};
    use crate::referential::{InMemoryArchiveReferential, InMemoryReadRequestRepository};
    use crate::retention::DirectoryRetentionPolicy;
    use crate::testing::{ScriptedDrive, ScriptedRobotPool};
    use crossbeam::channel;
    use std::time::Duration;
    use tempfile::TempDir;

    fn services(catalog: Arc<InMemoryTapeCatalog>, dir: &TempDir) -> WorkerServices {
        WorkerServices {
            catalog,
            read_requests: Arc::new(InMemoryReadRequestRepository::new()),
            retention: Arc::new(
                DirectoryRetentionPolicy::new(dir.path().join("out"), Duration::from_secs(60)).unwrap(),
            ),
            archive_referential: Arc::new(InMemoryArchiveReferential::new()),
            write_options: WriteTaskOptions::new(dir.path().join("in")),
            retry: RetryPolicy::new(1, Duration::ZERO),
            max_attempts: 2,
        }
    }

    #[test]
    fn test_worker_keeps_mounted_cartridge_between_orders() {
        let dir = TempDir::new().unwrap();
        let catalog = Arc::new(
            InMemoryTapeCatalog::with_cartridges(vec![TapeCartridge::new(
                "T1",
                "LIB",
                TapeLocation::slot(1),
            )])
            .unwrap(),
        );
        let drive = ScriptedDrive::new(0);
        let robots = ScriptedRobotPool::new("LIB");
        let queue = Arc::new(OrderQueue::new());
        queue.push(TapeOrder::Read(ReadOrder::new("T1", 0, "a.tar")));
        queue.push(TapeOrder::Read(ReadOrder::new("T1", 1, "b.tar")));
        let (tx, rx) = channel::unbounded();

        let worker = TapeDriveWorker::new(
            TapeLibraryService::new(drive.clone(), robots.clone()),
            services(catalog, &dir),
            queue,
            tx,
        );
        let left = worker.run().unwrap();

        let outcomes: Vec<_> = rx.try_iter().collect();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.result.status == StatusCode::Ok));
        assert_eq!(left.code, "T1");
        assert_eq!(left.current_position, 2);
        // loaded once, read twice
        assert_eq!(robots.calls(), vec!["load(0,1)"]);
    }

    #[test]
    fn test_retryable_orders_are_requeued_until_max_attempts() {
        let dir = TempDir::new().unwrap();
        let catalog = Arc::new(InMemoryTapeCatalog::new());
        let drive = ScriptedDrive::new(0);
        let robots = ScriptedRobotPool::new("LIB");
        let queue = Arc::new(OrderQueue::new());
        std::fs::create_dir_all(dir.path().join("in")).unwrap();
        std::fs::write(dir.path().join("in").join("f.tar"), b"x").unwrap();
        // no cartridge at all: FATAL/READY every time
        queue.push(TapeOrder::Write(WriteOrder::new("b", "f.tar", 1)));
        let (tx, rx) = channel::unbounded();

        TapeDriveWorker::new(
            TapeLibraryService::new(drive, robots),
            services(catalog, &dir),
            queue.clone(),
            tx,
        )
        .run();

        let outcomes: Vec<_> = rx.try_iter().collect();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].requeued);
        assert!(!outcomes[1].requeued);
        assert_eq!(outcomes[1].attempt, 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_worker_recovers_lost_cartridge_from_catalog() {
        let dir = TempDir::new().unwrap();
        let mounted = TapeCartridge::new("T1", "LIB", TapeLocation::drive(0))
            .with_previous_location(TapeLocation::slot(1));
        let catalog = Arc::new(InMemoryTapeCatalog::with_cartridges(vec![mounted]).unwrap());
        let queue = Arc::new(OrderQueue::new());
        let (tx, _rx) = channel::unbounded();

        let left = TapeDriveWorker::new(
            TapeLibraryService::new(ScriptedDrive::new(0), ScriptedRobotPool::new("LIB")),
            services(catalog, &dir),
            queue,
            tx,
        )
        .run();

        assert_eq!(left.map(|t| t.code), Some("T1".to_string()));
    }
}
