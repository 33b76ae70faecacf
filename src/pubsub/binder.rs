//! A session's single live subscription.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::app::PeerId;
use crate::pubsub::{PublicationRegistry, SubscribeError};

/// Channel end a session reads live data from.
pub type LiveSource = mpsc::UnboundedReceiver<Bytes>;

/// A session's subscription to one publication.
///
/// Owns the receiving end of the channel opened for this subscription only;
/// dropping the listener discards anything still queued.
#[derive(Debug)]
pub struct Listener {
    pub publication: String,
    source: LiveSource,
}

impl Listener {
    /// Next chunk of live data. `None` once the publication is gone and
    /// everything it sent has been taken.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.source.recv().await
    }

    /// Queued chunk, without waiting.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.source.try_recv().ok()
    }

    /// The publication dropped its end and nothing is left to forward.
    pub fn is_finished(&self) -> bool {
        self.source.is_closed() && self.source.is_empty()
    }
}

/// Keeps at most one subscription per session.
pub struct SubscriptionBinder {
    registry: Arc<dyn PublicationRegistry>,
    listener: Option<Listener>,
}

impl SubscriptionBinder {
    pub fn new(registry: Arc<dyn PublicationRegistry>) -> Self {
        Self {
            registry,
            listener: None,
        }
    }

    /// Subscribe `peer` to `publication` over a fresh channel, dropping any
    /// previous subscription first.
    ///
    /// On failure the session holds no subscription; callers treat that as
    /// "not handled".
    pub fn bind(&mut self, peer: PeerId, publication: &str) -> Result<&Listener, SubscribeError> {
        self.unbind(peer);
        let (sink, source) = mpsc::unbounded_channel();
        match self.registry.subscribe(peer, publication, sink) {
            Ok(()) => {
                crate::observability::metrics::record_subscription("bound");
                tracing::info!(peer = %peer, publication = %publication, "Live subscription bound");
                let listener = self.listener.insert(Listener {
                    publication: publication.to_string(),
                    source,
                });
                Ok(&*listener)
            }
            Err(e) => {
                crate::observability::metrics::record_subscription("failed");
                tracing::debug!(peer = %peer, error = %e, "Live subscription failed");
                Err(e)
            }
        }
    }

    /// Drop the current subscription, if any.
    pub fn unbind(&mut self, peer: PeerId) {
        if let Some(listener) = self.listener.take() {
            self.registry.unsubscribe(peer, &listener.publication);
            tracing::debug!(peer = %peer, publication = %listener.publication, "Live subscription unbound");
        }
    }

    pub fn listener(&self) -> Option<&Listener> {
        self.listener.as_ref()
    }

    pub fn listener_mut(&mut self) -> Option<&mut Listener> {
        self.listener.as_mut()
    }

    pub fn is_bound(&self) -> bool {
        self.listener.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::{LiveSink, Publications};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<String>>,
        refuse: Option<&'static str>,
    }

    impl PublicationRegistry for Recording {
        fn subscribe(&self, _peer: PeerId, publication: &str, _sink: LiveSink) -> Result<(), SubscribeError> {
            self.calls.lock().unwrap().push(format!("subscribe {}", publication));
            if self.refuse == Some(publication) {
                return Err(SubscribeError::NoSuchPublication(publication.to_string()));
            }
            Ok(())
        }

        fn unsubscribe(&self, _peer: PeerId, publication: &str) {
            self.calls.lock().unwrap().push(format!("unsubscribe {}", publication));
        }
    }

    #[test]
    fn test_rebind_unsubscribes_first() {
        let registry = Arc::new(Recording::default());
        let mut binder = SubscriptionBinder::new(registry.clone());
        let peer = PeerId::new();

        binder.bind(peer, "one").unwrap();
        binder.bind(peer, "two").unwrap();

        assert_eq!(
            *registry.calls.lock().unwrap(),
            vec!["subscribe one", "unsubscribe one", "subscribe two"]
        );
        assert_eq!(binder.listener().map(|l| l.publication.as_str()), Some("two"));
    }

    #[test]
    fn test_failed_bind_leaves_nothing_bound() {
        let registry = Arc::new(Recording {
            refuse: Some("two"),
            ..Default::default()
        });
        let mut binder = SubscriptionBinder::new(registry.clone());
        let peer = PeerId::new();

        binder.bind(peer, "one").unwrap();
        assert!(binder.bind(peer, "two").is_err());
        assert!(!binder.is_bound());
    }

    #[test]
    fn test_unbind_is_idempotent() {
        let registry = Arc::new(Recording::default());
        let mut binder = SubscriptionBinder::new(registry.clone());
        let peer = PeerId::new();
        binder.unbind(peer);

        binder.bind(peer, "one").unwrap();
        binder.unbind(peer);
        binder.unbind(peer);
        assert_eq!(registry.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_rebind_discards_data_queued_for_old_publication() {
        let publications = Publications::new();
        let cam1 = publications.publish("cam1").unwrap();
        let cam2 = publications.publish("cam2").unwrap();
        let mut binder = SubscriptionBinder::new(Arc::new(publications.clone()));
        let peer = PeerId::new();

        binder.bind(peer, "cam1").unwrap();
        assert_eq!(cam1.push(Bytes::from_static(b"cam1-frame")), 1);
        binder.bind(peer, "cam2").unwrap();

        let listener = binder.listener_mut().unwrap();
        assert_eq!(listener.try_recv(), None);
        assert_eq!(cam2.push(Bytes::from_static(b"cam2-frame")), 1);
        assert_eq!(listener.try_recv(), Some(Bytes::from_static(b"cam2-frame")));
        assert_eq!(publications.subscriber_count("cam1"), 0);
    }

    #[test]
    fn test_listener_finishes_after_queued_data_when_publisher_drops() {
        let publications = Publications::new();
        let publisher = publications.publish("cam").unwrap();
        let mut binder = SubscriptionBinder::new(Arc::new(publications.clone()));
        binder.bind(PeerId::new(), "cam").unwrap();

        publisher.push(Bytes::from_static(b"last"));
        drop(publisher);

        let listener = binder.listener_mut().unwrap();
        assert!(!listener.is_finished());
        assert_eq!(listener.try_recv(), Some(Bytes::from_static(b"last")));
        assert!(listener.is_finished());
    }
}
