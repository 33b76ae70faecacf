//! Publication registry.
//!
//! # Responsibilities
//! - Define the registry interface sessions subscribe through
//! - Provide the in-memory registry the server runs with
//! - Fan out published bytes to subscriber sinks
//!
//! # Design Decisions
//! - `DashMap` shards locking per publication, so sessions subscribing to
//!   different streams never contend
//! - Subscribers whose sink has closed are pruned on the next push

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::app::PeerId;

/// Channel end a publication writes live data into.
pub type LiveSink = mpsc::UnboundedSender<Bytes>;

/// Why a subscription could not be established.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscribeError {
    #[error("publication {0} not found")]
    NoSuchPublication(String),

    #[error("subscriber rejected by publication {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("publication {0} already exists")]
    AlreadyPublished(String),
}

/// Registry of live publications, shared by every session.
///
/// Implementations must tolerate concurrent calls from many sessions.
pub trait PublicationRegistry: Send + Sync {
    fn subscribe(&self, peer: PeerId, publication: &str, sink: LiveSink) -> Result<(), SubscribeError>;

    /// Remove `peer` from `publication`. Unknown pairs are ignored.
    fn unsubscribe(&self, peer: PeerId, publication: &str);
}

type Subscribers = DashMap<PeerId, LiveSink>;

/// In-memory registry.
#[derive(Debug, Clone, Default)]
pub struct Publications {
    inner: Arc<DashMap<String, Arc<Subscribers>>>,
}

impl Publications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open publication `name`.
    pub fn publish(&self, name: &str) -> Result<Publisher, PublishError> {
        let subscribers = match self.inner.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(PublishError::AlreadyPublished(name.to_string()));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                Arc::clone(slot.insert(Arc::new(DashMap::new())).value())
            }
        };
        tracing::info!(publication = %name, "Publication opened");
        Ok(Publisher {
            name: name.to_string(),
            subscribers,
            registry: self.clone(),
        })
    }

    /// Close publication `name`; its subscribers' sinks are dropped, which
    /// ends their streams even while a `Publisher` handle is still alive.
    pub fn unpublish(&self, name: &str) {
        if let Some((_, subscribers)) = self.inner.remove(name) {
            subscribers.clear();
            tracing::info!(publication = %name, "Publication closed");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.inner.get(name).map(|s| s.len()).unwrap_or(0)
    }
}

impl PublicationRegistry for Publications {
    fn subscribe(&self, peer: PeerId, publication: &str, sink: LiveSink) -> Result<(), SubscribeError> {
        let subscribers = self
            .inner
            .get(publication)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SubscribeError::NoSuchPublication(publication.to_string()))?;

        if subscribers.contains_key(&peer) {
            return Err(SubscribeError::Rejected(publication.to_string()));
        }
        subscribers.insert(peer, sink);
        tracing::debug!(publication = %publication, peer = %peer, "Subscriber added");
        Ok(())
    }

    fn unsubscribe(&self, peer: PeerId, publication: &str) {
        if let Some(subscribers) = self.inner.get(publication) {
            if subscribers.remove(&peer).is_some() {
                tracing::debug!(publication = %publication, peer = %peer, "Subscriber removed");
            }
        }
    }
}

/// Handle to an open publication. Dropping it closes the publication.
#[derive(Debug)]
pub struct Publisher {
    name: String,
    subscribers: Arc<Subscribers>,
    registry: Publications,
}

impl Publisher {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send `data` to every subscriber. Returns how many received it.
    pub fn push(&self, data: Bytes) -> usize {
        let mut delivered = 0;
        let mut gone = Vec::new();
        for entry in self.subscribers.iter() {
            if entry.value().send(data.clone()).is_ok() {
                delivered += 1;
            } else {
                gone.push(*entry.key());
            }
        }
        // Removing while iterating would deadlock the shard.
        for peer in gone {
            self.subscribers.remove(&peer);
        }
        delivered
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.registry.unpublish(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_requires_publication() {
        let registry = Publications::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        assert_eq!(
            registry.subscribe(PeerId::new(), "cam", tx),
            Err(SubscribeError::NoSuchPublication("cam".into()))
        );
    }

    #[test]
    fn test_duplicate_subscriber_rejected() {
        let registry = Publications::new();
        let _publisher = registry.publish("cam").unwrap();
        let peer = PeerId::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        registry.subscribe(peer, "cam", tx.clone()).unwrap();
        assert_eq!(
            registry.subscribe(peer, "cam", tx),
            Err(SubscribeError::Rejected("cam".into()))
        );
    }

    #[test]
    fn test_push_fans_out_and_prunes() {
        let registry = Publications::new();
        let publisher = registry.publish("cam").unwrap();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();
        registry.subscribe(PeerId::new(), "cam", tx1).unwrap();
        registry.subscribe(PeerId::new(), "cam", tx2).unwrap();
        drop(rx2);

        assert_eq!(publisher.push(Bytes::from_static(b"frame")), 1);
        assert_eq!(rx1.try_recv().unwrap(), Bytes::from_static(b"frame"));
        assert_eq!(registry.subscriber_count("cam"), 1);
    }

    #[test]
    fn test_drop_publisher_unpublishes() {
        let registry = Publications::new();
        let publisher = registry.publish("cam").unwrap();
        assert!(matches!(
            registry.publish("cam"),
            Err(PublishError::AlreadyPublished(_))
        ));
        drop(publisher);
        assert!(!registry.contains("cam"));
    }

    #[test]
    fn test_unpublish_closes_subscriber_sinks() {
        let registry = Publications::new();
        let _publisher = registry.publish("cam").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.subscribe(PeerId::new(), "cam", tx).unwrap();

        registry.unpublish("cam");
        assert!(rx.is_closed());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_unknown_is_noop() {
        let registry = Publications::new();
        registry.unsubscribe(PeerId::new(), "nothing");
    }
}
