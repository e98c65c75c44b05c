//! Change signaling between the scanner and snapshot consumers.
//!
//! Built on [`tokio::sync::watch`]: the notifier bumps a generation counter,
//! receivers observe "something changed since you last looked". Delivery is
//! edge-triggered and best-effort - if nobody is listening the event is
//! dropped rather than back-pressuring the scanner, and a slow consumer sees
//! one wake-up for any number of missed notifications. Consumers are
//! expected to take a fresh [`Cache`](modwatch_cache::Cache) snapshot when
//! woken, not to count events.

use async_stream::stream;
use futures::Stream;
use tokio::sync::watch;

/// Sending half of the change signal. Owned by the scanner.
#[derive(Debug)]
pub struct Notifier {
    tx: watch::Sender<u64>,
}

impl Notifier {
    /// Create a notifier with no subscribers yet.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx }
    }

    /// Hand out a new independent subscription.
    ///
    /// A subscription only observes notifications sent after this call.
    pub fn subscribe(&self) -> Subscription {
        Subscription { rx: self.tx.subscribe() }
    }

    /// Signal that the cache changed. Never blocks.
    pub fn notify(&self) {
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of the change signal. One consumer per subscription.
#[derive(Debug)]
pub struct Subscription {
    rx: watch::Receiver<u64>,
}

impl Subscription {
    /// Wait until the cache changes.
    ///
    /// Returns `false` once the notifier is gone and no further change can
    /// ever arrive, which is the consumer's cue to stop listening.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Non-blocking probe: has the cache changed since the last observation?
    ///
    /// Marks the change as seen, so two probes with no intervening
    /// notification return `true` at most once.
    pub fn poll_changed(&mut self) -> bool {
        match self.rx.has_changed() {
            Ok(true) => {
                self.rx.borrow_and_update();
                true
            },
            _ => false,
        }
    }

    /// Adapt the subscription into a [`Stream`] of change events.
    ///
    /// The stream ends when the notifier is dropped.
    pub fn into_stream(self) -> impl Stream<Item = ()> {
        let mut rx = self.rx;
        stream! {
            while rx.changed().await.is_ok() {
                yield ();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn notification_is_edge_triggered() {
        let notifier = Notifier::new();
        let mut subscription = notifier.subscribe();
        assert!(!subscription.poll_changed());

        notifier.notify();
        notifier.notify();
        // Two notifications, one observation.
        assert!(subscription.poll_changed());
        assert!(!subscription.poll_changed());
    }

    #[tokio::test]
    async fn changed_wakes_a_waiting_consumer() {
        let notifier = Notifier::new();
        let mut subscription = notifier.subscribe();
        notifier.notify();
        assert!(subscription.changed().await);
    }

    #[tokio::test]
    async fn dropping_the_notifier_ends_the_subscription() {
        let notifier = Notifier::new();
        let mut subscription = notifier.subscribe();
        drop(notifier);
        assert!(!subscription.changed().await);
    }

    #[tokio::test]
    async fn notify_without_listeners_does_not_block() {
        let notifier = Notifier::new();
        notifier.notify();
        // A subscription taken afterwards starts clean.
        let mut subscription = notifier.subscribe();
        assert!(!subscription.poll_changed());
    }

    #[tokio::test]
    async fn stream_adapter_yields_per_wakeup() {
        let notifier = Notifier::new();
        let subscription = notifier.subscribe();
        notifier.notify();
        let mut stream = Box::pin(subscription.into_stream());
        assert_eq!(stream.next().await, Some(()));
        drop(notifier);
        assert_eq!(stream.next().await, None);
    }
}
