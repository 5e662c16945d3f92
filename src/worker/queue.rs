use crate::model::{ReadOrder, WriteOrder};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TapeOrder {
    Read(ReadOrder),
    Write(WriteOrder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedOrder {
    pub id: u64,
    pub order: TapeOrder,
    /// Attempts already made
    pub attempts: u32,
}

/// FIFO of pending orders shared by the drive workers of one library
#[derive(Debug, Default)]
pub struct OrderQueue {
    orders: Mutex<VecDeque<QueuedOrder>>,
    next_id: AtomicU64,
}

impl OrderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, order: TapeOrder) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.orders.lock().push_back(QueuedOrder {
            id,
            order,
            attempts: 0,
        });
        id
    }

    /// Put an order back at the end of the queue for another attempt
    pub fn requeue(&self, order: QueuedOrder) {
        debug!("Order {} requeued after {} attempts", order.id, order.attempts);
        self.orders.lock().push_back(order);
    }

    pub fn pop(&self) -> Option<QueuedOrder> {
        self.orders.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.orders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_with_requeue() {
        let queue = OrderQueue::new();
        let first = queue.push(TapeOrder::Read(ReadOrder::new("T1", 0, "a")));
        let second = queue.push(TapeOrder::Write(WriteOrder::new("b", "f", 1)));
        assert_eq!((first, second), (1, 2));

        let mut popped = queue.pop().unwrap();
        assert_eq!(popped.id, 1);
        popped.attempts += 1;
        queue.requeue(popped);

        assert_eq!(queue.pop().unwrap().id, 2);
        let again = queue.pop().unwrap();
        assert_eq!((again.id, again.attempts), (1, 1));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_orders_file_format() {
        let json = r#"[
            {"type": "read", "tape_code": "TAPE-1", "file_position": 1, "file_name": "a.tar"},
            {"type": "write", "bucket": "default", "file_path": "b.tar", "size": 10}
        ]"#;
        let orders: Vec<TapeOrder> = serde_json::from_str(json).unwrap();
        assert_eq!(orders[0], TapeOrder::Read(ReadOrder::new("TAPE-1", 1, "a.tar")));
        assert_eq!(orders[1], TapeOrder::Write(WriteOrder::new("default", "b.tar", 10)));
    }
}
