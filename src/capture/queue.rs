//! Ordered buffer of captures awaiting a single analysis request.
//!
//! Producer: the capture hotkey. Consumer: the analysis pipeline, which
//! drains everything at once. Bounded so a held-down hotkey cannot grow
//! memory without limit.

use super::CaptureItem;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("capture queue is full ({capacity} screenshots)")]
pub struct QueueFull {
    pub capacity: usize,
}

pub struct CaptureQueue {
    items: Mutex<VecDeque<CaptureItem>>,
    capacity: usize,
}

impl CaptureQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<CaptureItem>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a capture; returns the new length.
    pub fn enqueue(&self, item: CaptureItem) -> Result<usize, QueueFull> {
        let mut items = self.lock();
        if items.len() >= self.capacity {
            log::warn!("[QUEUE] Rejected capture, queue full at {}", self.capacity);
            return Err(QueueFull {
                capacity: self.capacity,
            });
        }
        items.push_back(item);
        log::info!("[QUEUE] Screenshot queued (total: {})", items.len());
        Ok(items.len())
    }

    /// Take every queued capture, oldest first, leaving the queue empty.
    pub fn drain_all(&self) -> Vec<CaptureItem> {
        let drained: Vec<CaptureItem> = self.lock().drain(..).collect();
        if !drained.is_empty() {
            log::info!("[QUEUE] Drained {} screenshot(s)", drained.len());
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(tag: u8) -> CaptureItem {
        CaptureItem::new(vec![tag])
    }

    #[test]
    fn enqueue_reports_running_total() {
        let q = CaptureQueue::new(5);
        assert_eq!(q.enqueue(item(1)), Ok(1));
        assert_eq!(q.enqueue(item(2)), Ok(2));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn drain_preserves_capture_order() {
        let q = CaptureQueue::new(5);
        q.enqueue(item(b'A')).unwrap();
        q.enqueue(item(b'B')).unwrap();
        let drained: Vec<u8> = q.drain_all().into_iter().map(|i| i.png[0]).collect();
        assert_eq!(drained, vec![b'A', b'B']);
    }

    #[test]
    fn second_drain_is_empty() {
        let q = CaptureQueue::new(5);
        q.enqueue(item(1)).unwrap();
        assert_eq!(q.drain_all().len(), 1);
        assert!(q.drain_all().is_empty());
        assert!(q.is_empty());
    }

    #[test]
    fn full_queue_rejects_until_drained() {
        let q = CaptureQueue::new(2);
        q.enqueue(item(1)).unwrap();
        q.enqueue(item(2)).unwrap();
        assert_eq!(q.enqueue(item(3)), Err(QueueFull { capacity: 2 }));
        assert_eq!(q.len(), 2);

        q.drain_all();
        assert_eq!(q.enqueue(item(4)), Ok(1));
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let q = CaptureQueue::new(0);
        assert_eq!(q.capacity(), 1);
        assert!(q.enqueue(item(1)).is_ok());
    }
}
