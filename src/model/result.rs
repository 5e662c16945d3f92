use super::cartridge::TapeCartridge;
use serde::{Deserialize, Serialize};

/// Outcome of the transfer itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    /// Catalog infrastructure hiccup
    Ko,
    /// Mechanical or media failure
    Fatal,
}

/// Next lifecycle stage of the order in the external queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueState {
    /// Retry later, no destructive state change assumed
    Ready,
    Completed,
    /// Do not retry automatically
    Error,
}

/// The only artifact handed back to the order queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadWriteResult {
    pub status: StatusCode,
    pub order_state: QueueState,
    /// Cartridge the drive is known to hold after the task, if any
    pub current_tape: Option<TapeCartridge>,
}

impl ReadWriteResult {
    pub fn new(
        status: StatusCode,
        order_state: QueueState,
        current_tape: Option<TapeCartridge>,
    ) -> Self {
        Self {
            status,
            order_state,
            current_tape,
        }
    }

    pub fn completed(current_tape: TapeCartridge) -> Self {
        Self::new(StatusCode::Ok, QueueState::Completed, Some(current_tape))
    }

    pub fn is_retryable(&self) -> bool {
        self.order_state == QueueState::Ready
    }
}
