//! Fan-out endpoint at the end of every pipeline.

use std::sync::Arc;

use bytes::Bytes;
use log::{debug, warn};
use tokio::sync::mpsc::error::TrySendError;

use crate::listener::ListenerRegistry;

/// Write endpoint that copies each chunk to every live listener.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    registry: Arc<ListenerRegistry>,
}

impl BroadcastSink {
    pub fn new(registry: Arc<ListenerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    /// Deliver one broadcast tick.
    ///
    /// Listeners whose write side has ended are removed instead of written to,
    /// and so are listeners whose backlog is full: the pipeline never waits on
    /// a slow reader and never queues more than the backlog for it. With no
    /// listeners the chunk is discarded.
    ///
    /// # Returns
    /// The number of listeners that received the chunk.
    pub fn consume(&self, chunk: Bytes) -> usize {
        let mut delivered = 0;
        let mut streams = self.registry.lock();
        streams.retain(|id, tx| {
            if tx.is_closed() {
                debug!("pruning closed listener {}", id);
                return false;
            }
            match tx.try_send(chunk.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!("listener {} fell too far behind, dropping it", id);
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("listener {} closed mid-tick, pruning", id);
                    false
                }
            }
        });
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::ListenerStream;

    fn drain(stream: &mut ListenerStream) -> Vec<Bytes> {
        std::iter::from_fn(|| stream.try_recv()).collect()
    }

    #[test]
    fn every_listener_receives_each_chunk_in_order() {
        let registry = Arc::new(ListenerRegistry::new());
        let sink = BroadcastSink::new(registry.clone());
        let mut streams: Vec<_> = (0..5).map(|_| registry.register().1).collect();

        for chunk in ["one", "two", "three"] {
            assert_eq!(sink.consume(Bytes::from_static(chunk.as_bytes())), 5);
        }

        for stream in streams.iter_mut() {
            assert_eq!(
                drain(stream),
                vec![
                    Bytes::from_static(b"one"),
                    Bytes::from_static(b"two"),
                    Bytes::from_static(b"three")
                ]
            );
        }
    }

    #[test]
    fn disconnected_listener_is_pruned_on_next_tick() {
        let registry = Arc::new(ListenerRegistry::new());
        let sink = BroadcastSink::new(registry.clone());
        let (a, mut stream_a) = registry.register();
        let (b, mut stream_b) = registry.register();

        for chunk in [&b"1"[..], b"2", b"3"] {
            sink.consume(Bytes::copy_from_slice(chunk));
        }
        assert_eq!(drain(&mut stream_a), drain(&mut stream_b));

        drop(stream_a);
        assert!(registry.contains(a));

        assert_eq!(sink.consume(Bytes::from_static(b"4")), 1);
        assert!(!registry.contains(a));
        assert!(registry.contains(b));
        assert_eq!(drain(&mut stream_b), vec![Bytes::from_static(b"4")]);
    }

    #[test]
    fn closed_stream_is_never_written_again() {
        let registry = Arc::new(ListenerRegistry::new());
        let sink = BroadcastSink::new(registry.clone());
        let (id, mut stream) = registry.register();

        sink.consume(Bytes::from_static(b"before"));
        stream.close();
        sink.consume(Bytes::from_static(b"after"));

        assert!(!registry.contains(id));
        assert_eq!(drain(&mut stream), vec![Bytes::from_static(b"before")]);
    }

    #[test]
    fn stalled_listener_is_dropped_once_its_backlog_is_full() {
        let registry = Arc::new(ListenerRegistry::with_backlog(4));
        let sink = BroadcastSink::new(registry.clone());
        let (stalled, mut stalled_stream) = registry.register();
        let (reader, mut reader_stream) = registry.register();

        let chunk = Bytes::from(vec![0_u8; 4096]);
        let mut read = 0;
        for _ in 0..10_000 {
            sink.consume(chunk.clone());
            read += drain(&mut reader_stream).len();
        }

        assert_eq!(read, 10_000);
        assert!(!registry.contains(stalled));
        assert!(registry.contains(reader));
        assert_eq!(drain(&mut stalled_stream).len(), 4);
        assert!(stalled_stream.try_recv().is_none());
    }

    #[test]
    fn empty_registry_discards_chunks() {
        let sink = BroadcastSink::new(Arc::new(ListenerRegistry::new()));
        assert_eq!(sink.consume(Bytes::from_static(b"nobody")), 0);
    }
}
