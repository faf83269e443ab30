use parking_lot::Mutex;
use std::sync::Arc;

use super::error::{ExchangeError, Result};
use super::types::IngestionStatus;

/// Shared "is an exchange in flight" cell. Cloned into whoever needs to
/// observe or gate submissions; there is no global.
#[derive(Debug, Clone, Default)]
pub struct ExchangeGate {
    status: Arc<Mutex<IngestionStatus>>,
}

impl ExchangeGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(&self) -> IngestionStatus {
        *self.status.lock()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.status() == IngestionStatus::Streaming
    }

    pub fn try_begin(&self) -> Result<ExchangePermit> {
        let mut status = self.status.lock();
        if *status == IngestionStatus::Streaming {
            return Err(ExchangeError::ConcurrentRequest);
        }
        *status = IngestionStatus::Streaming;
        Ok(ExchangePermit {
            gate: self.clone(),
            settled: false,
        })
    }
}

/// Held for the lifetime of one exchange. Dropping it without settling puts
/// the gate back to `Idle`.
#[derive(Debug)]
pub struct ExchangePermit {
    gate: ExchangeGate,
    settled: bool,
}

impl ExchangePermit {
    pub fn settle(mut self, status: IngestionStatus) {
        *self.gate.status.lock() = status;
        self.settled = true;
    }
}

impl Drop for ExchangePermit {
    fn drop(&mut self) {
        if !self.settled {
            *self.gate.status.lock() = IngestionStatus::Idle;
        }
    }
}
