// src/engine/queue.rs

//! Unbounded change queue between the event source and the dispatcher.
//!
//! Producers push [`QueueItem`]s through a cloneable [`ChangeSender`]; the
//! single [`ChangeReceiver`] drains them in arrival order. The queue keeps a
//! count of items that were pushed but not yet marked consumed so that
//! shutdown can wait for the dispatcher to actually act on everything.
//!
//! Pushing [`QueueItem::Shutdown`] closes the queue: later pushes are
//! rejected, so the sentinel is always the last item the receiver sees.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, Notify};
use tracing::{debug, trace};

use crate::errors::{Result, TdaemonError};

/// One entry in the change queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    /// A path reported as changed.
    Change(PathBuf),
    /// No more changes will be produced; halt after draining.
    Shutdown,
}

#[derive(Debug, Default)]
struct TrackerState {
    unfinished: usize,
    closed: bool,
}

/// Outstanding-item bookkeeping shared by both ends.
#[derive(Debug, Default)]
struct Tracker {
    state: Mutex<TrackerState>,
    drained: Notify,
}

impl Tracker {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, n: usize) {
        let mut state = self.lock();
        state.unfinished = state.unfinished.saturating_sub(n);
        if state.unfinished == 0 {
            self.drained.notify_waiters();
        }
    }
}

/// Producer handle. Cheap to clone; never blocks.
#[derive(Debug, Clone)]
pub struct ChangeSender {
    tx: mpsc::UnboundedSender<QueueItem>,
    tracker: Arc<Tracker>,
}

/// Consumer handle. There is exactly one per queue.
#[derive(Debug)]
pub struct ChangeReceiver {
    rx: mpsc::UnboundedReceiver<QueueItem>,
    tracker: Arc<Tracker>,
}

/// Items pulled out of the queue by one drain call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Drained {
    /// Changed paths, in arrival order.
    pub changes: Vec<PathBuf>,
    /// Whether the shutdown sentinel (or a closed channel) was observed.
    pub shutdown: bool,
}

impl Drained {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && !self.shutdown
    }

    /// Append a later drain, keeping arrival order.
    pub fn extend(&mut self, later: Drained) {
        self.changes.extend(later.changes);
        self.shutdown |= later.shutdown;
    }
}

/// Create a connected sender/receiver pair.
pub fn change_queue() -> (ChangeSender, ChangeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let tracker = Arc::new(Tracker::default());
    (
        ChangeSender {
            tx,
            tracker: Arc::clone(&tracker),
        },
        ChangeReceiver { rx, tracker },
    )
}

impl ChangeSender {
    /// Append an item. Fails once the queue has been shut down or the
    /// receiver is gone; rejected items are not counted.
    pub fn push(&self, item: QueueItem) -> Result<()> {
        let mut state = self.tracker.lock();
        if state.closed {
            trace!(?item, "queue closed; rejecting item");
            return Err(TdaemonError::QueueClosed);
        }
        let closes = item == QueueItem::Shutdown;
        if self.tx.send(item).is_err() {
            return Err(TdaemonError::QueueClosed);
        }
        state.unfinished += 1;
        if closes {
            state.closed = true;
        }
        Ok(())
    }

    pub fn push_change(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.push(QueueItem::Change(path.into()))
    }

    /// Push the sentinel and close the queue to further changes.
    pub fn shutdown(&self) -> Result<()> {
        self.push(QueueItem::Shutdown)?;
        debug!("shutdown sentinel queued");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tracker.lock().closed
    }

    /// Items pushed but not yet marked consumed.
    pub fn unfinished(&self) -> usize {
        self.tracker.lock().unfinished
    }

    /// Wait until every pushed item has been marked consumed.
    ///
    /// Also returns if the receiver is dropped, since nothing can consume the
    /// remaining items after that.
    pub async fn join(&self) {
        loop {
            let notified = self.tracker.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.tracker.lock().unfinished == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl ChangeReceiver {
    /// Wait for at least one item, then take everything currently queued.
    ///
    /// Stops at the shutdown sentinel. A channel with no senders left is
    /// reported as shutdown as well.
    pub async fn drain_available(&mut self) -> Drained {
        let mut drained = Drained::default();
        match self.rx.recv().await {
            Some(item) => {
                if self.absorb(item, &mut drained) {
                    return drained;
                }
            }
            None => {
                debug!("all change senders dropped; treating as shutdown");
                drained.shutdown = true;
                return drained;
            }
        }
        drained.extend(self.try_drain());
        drained
    }

    /// Take everything currently queued without waiting.
    pub fn try_drain(&mut self) -> Drained {
        let mut drained = Drained::default();
        loop {
            match self.rx.try_recv() {
                Ok(item) => {
                    if self.absorb(item, &mut drained) {
                        break;
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    drained.shutdown = true;
                    break;
                }
            }
        }
        drained
    }

    /// Returns `true` when the item was the sentinel.
    fn absorb(&self, item: QueueItem, drained: &mut Drained) -> bool {
        match item {
            QueueItem::Change(path) => {
                drained.changes.push(path);
                false
            }
            QueueItem::Shutdown => {
                drained.shutdown = true;
                true
            }
        }
    }

    /// Record that `n` previously drained items have been fully handled.
    pub fn mark_consumed(&self, n: usize) {
        if n > 0 {
            self.tracker.release(n);
        }
    }
}

impl Drop for ChangeReceiver {
    fn drop(&mut self) {
        // Nobody can consume what is left; let `join` waiters go.
        self.tracker.release(usize::MAX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn drains_in_fifo_order() {
        let (tx, mut rx) = change_queue();
        tx.push_change("/p/a").unwrap();
        tx.push_change("/p/b").unwrap();
        tx.push_change("/p/c").unwrap();

        let drained = rx.drain_available().await;
        assert_eq!(
            drained.changes,
            vec![
                PathBuf::from("/p/a"),
                PathBuf::from("/p/b"),
                PathBuf::from("/p/c")
            ]
        );
        assert!(!drained.shutdown);
        assert!(rx.try_drain().is_empty());
    }

    #[tokio::test]
    async fn sentinel_is_distinct_from_any_path() {
        let (tx, mut rx) = change_queue();
        tx.push_change("Shutdown").unwrap();
        tx.push_change("").unwrap();

        let drained = rx.drain_available().await;
        assert_eq!(drained.changes.len(), 2);
        assert!(!drained.shutdown);
    }

    #[tokio::test]
    async fn shutdown_closes_queue() {
        let (tx, mut rx) = change_queue();
        tx.push_change("/p/a").unwrap();
        tx.shutdown().unwrap();
        assert!(tx.is_closed());
        assert!(matches!(tx.push_change("/p/late"), Err(TdaemonError::QueueClosed)));

        let drained = rx.drain_available().await;
        assert_eq!(drained.changes, vec![PathBuf::from("/p/a")]);
        assert!(drained.shutdown);
        assert_eq!(tx.unfinished(), 2);
    }

    #[tokio::test]
    async fn drain_blocks_until_an_item_arrives() {
        let (tx, mut rx) = change_queue();
        let handle = tokio::spawn(async move { rx.drain_available().await });

        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        tx.push_change("/p/a").unwrap();
        let drained = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(drained.changes, vec![PathBuf::from("/p/a")]);
    }

    #[tokio::test]
    async fn join_waits_for_mark_consumed() {
        let (tx, mut rx) = change_queue();
        tx.push_change("/p/a").unwrap();
        tx.push_change("/p/b").unwrap();

        let drained = rx.drain_available().await;
        rx.mark_consumed(1);
        assert_eq!(tx.unfinished(), 1);

        let joiner = {
            let tx = tx.clone();
            tokio::spawn(async move { tx.join().await })
        };
        tokio::task::yield_now().await;
        assert!(!joiner.is_finished());

        rx.mark_consumed(drained.changes.len() - 1);
        tokio::time::timeout(Duration::from_secs(1), joiner)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.unfinished(), 0);
    }

    #[tokio::test]
    async fn dropping_receiver_releases_join() {
        let (tx, rx) = change_queue();
        tx.push_change("/p/a").unwrap();
        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), tx.join())
            .await
            .unwrap();
        assert!(tx.push_change("/p/b").is_err());
    }
}
