//! Change event fan-out.
//!
//! Each subscriber owns an unbounded channel, so publishing never waits on a
//! slow consumer and every subscriber sees every event exactly once.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::models::ChangeEvent;

/// Publishes change events to all live subscribers.
#[derive(Debug, Default)]
pub struct ChangeBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ChangeEvent>>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ChangeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Deliver `event` to every subscriber, dropping closed ones.
    pub fn publish(&self, event: &ChangeEvent) {
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<ChangeEvent>>> {
        // Senders stay valid even if another holder panicked.
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
