//! Bounded hand-off queue between the dispatcher and the workers

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use super::error::DispatchError;
use super::tracker::Claim;
use crate::domain::LogEntry;

/// A log entry together with the claim that keeps it in flight
#[derive(Debug)]
pub struct Dispatched {
    entry: LogEntry,
    claim: Claim,
}

impl Dispatched {
    pub fn new(entry: LogEntry, claim: Claim) -> Self {
        debug_assert_eq!(&entry.id, claim.id(), "claim must cover the entry it travels with");
        Self { entry, claim }
    }

    pub fn entry(&self) -> &LogEntry {
        &self.entry
    }

    pub fn into_parts(self) -> (LogEntry, Claim) {
        (self.entry, self.claim)
    }
}

/// Bounded FIFO with blocking push and pop
///
/// Push suspends while the queue is full; pop suspends while it is empty.
/// Any number of producers and consumers may share a clone.
#[derive(Debug)]
pub struct HandoffQueue<T> {
    tx: mpsc::Sender<T>,
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for HandoffQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T: Send> HandoffQueue<T> {
    /// Create a queue holding at most `capacity` items
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Push an item, waiting for a free slot
    ///
    /// Cancelling the returned future drops the item.
    pub async fn push(&self, item: T) -> Result<(), DispatchError> {
        self.tx.send(item).await.map_err(|_| DispatchError::QueueClosed)
    }

    /// Push without waiting; hands the item back if the queue is full
    pub fn try_push(&self, item: T) -> Result<(), T> {
        self.tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(item) => item,
            mpsc::error::TrySendError::Closed(item) => item,
        })
    }

    /// Pop the oldest item, waiting until one is available
    pub async fn pop(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Remove and drop everything currently queued
    ///
    /// Returns the number of items dropped.
    pub async fn drain(&self) -> usize {
        let mut rx = self.rx.lock().await;
        let mut dropped = 0;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.tx.capacity() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = HandoffQueue::new(4);
        for n in 1..=3 {
            queue.push(n).await.unwrap();
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().await, Some(1));
        assert_eq!(queue.pop().await, Some(2));
        assert_eq!(queue.pop().await, Some(3));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_push_blocks_when_full() {
        let queue = HandoffQueue::new(2);
        queue.push(1).await.unwrap();
        queue.push(2).await.unwrap();
        assert!(queue.is_full());
        assert_eq!(queue.try_push(3), Err(3));

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.push(3).await })
        };

        // Still blocked: nothing was popped
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!producer.is_finished());
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop().await, Some(1));
        tokio::time::timeout(Duration::from_secs(1), producer)
            .await
            .expect("push should complete after a pop")
            .unwrap()
            .unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().await, Some(2));
        assert_eq!(queue.pop().await, Some(3));
    }

    #[tokio::test]
    async fn test_pop_blocks_when_empty() {
        let queue: HandoffQueue<u32> = HandoffQueue::new(1);

        let result = tokio::time::timeout(Duration::from_millis(50), queue.pop()).await;
        assert!(result.is_err());

        queue.push(7).await.unwrap();
        assert_eq!(queue.pop().await, Some(7));
    }

    #[tokio::test]
    async fn test_many_consumers_each_item_once() {
        let queue = HandoffQueue::new(8);
        let mut consumers = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            consumers.push(tokio::spawn(async move {
                let mut got = Vec::new();
                while let Ok(Some(n)) = tokio::time::timeout(Duration::from_millis(200), queue.pop()).await {
                    got.push(n);
                }
                got
            }));
        }

        for n in 0..100 {
            queue.push(n).await.unwrap();
        }

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        all.sort();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_drain() {
        let queue = HandoffQueue::new(4);
        queue.push("a").await.unwrap();
        queue.push("b").await.unwrap();

        assert_eq!(queue.drain().await, 2);
        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), 4);
    }
}
