//! Pending queue of submissions awaiting the next faculty batch
//!
//! The queue is process-local and lost on restart. Readers take a snapshot
//! and, once the batch is delivered, acknowledge exactly that many entries
//! from the front; entries appended in between stay queued. Only one flush
//! may hold a snapshot at a time (see [`crate::notifier::Notifier::flush`]).

use registrar_common::PendingNotification;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: Mutex<Vec<PendingNotification>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry
    pub async fn enqueue(&self, notification: PendingNotification) {
        let mut entries = self.entries.lock().await;
        entries.push(notification);
        debug!("Pending queue length: {}", entries.len());
    }

    /// Copy of the current entries, oldest first
    pub async fn snapshot(&self) -> Vec<PendingNotification> {
        self.entries.lock().await.clone()
    }

    /// Drop the `count` oldest entries after they were delivered
    pub async fn acknowledge(&self, count: usize) {
        let mut entries = self.entries.lock().await;
        let count = count.min(entries.len());
        entries.drain(..count);
        debug!(
            "Acknowledged {} pending entries, {} remain",
            count,
            entries.len()
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registrar_common::SerialNumber;

    fn entry(serial: u64) -> PendingNotification {
        PendingNotification {
            serial_number: SerialNumber::new(serial),
            applicant_name: format!("Applicant {}", serial),
            certificate_url: None,
            application_form_url: None,
        }
    }

    #[tokio::test]
    async fn test_acknowledge_keeps_later_entries() {
        let queue = PendingQueue::new();
        queue.enqueue(entry(1)).await;
        queue.enqueue(entry(2)).await;

        let snapshot = queue.snapshot().await;
        queue.enqueue(entry(3)).await;
        queue.acknowledge(snapshot.len()).await;

        assert_eq!(queue.snapshot().await, vec![entry(3)]);
    }

    #[tokio::test]
    async fn test_acknowledge_more_than_held() {
        let queue = PendingQueue::new();
        queue.enqueue(entry(1)).await;
        queue.acknowledge(5).await;
        assert!(queue.is_empty().await);
    }
}
