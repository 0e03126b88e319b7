//! Bounded per-kind event buffers.
//!
//! Producers never wait: when a buffer is full the incoming event is
//! dropped and the caller is told so.

use tokio::sync::mpsc::{self, error::TrySendError};

pub fn ring_buffer<T>(capacity: usize) -> (RingProducer<T>, RingConsumer<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (RingProducer { tx }, RingConsumer { rx })
}

pub struct RingProducer<T> {
    tx: mpsc::Sender<T>,
}

impl<T> RingProducer<T> {
    /// Enqueues `item`. Returns `false` if it was dropped.
    pub fn push(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
        }
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

pub struct RingConsumer<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> RingConsumer<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}
