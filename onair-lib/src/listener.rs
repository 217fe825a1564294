//! Connected listener streams and the registry that fans out to them.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};

/// Chunks a listener may fall behind before it is dropped.
pub const DEFAULT_LISTENER_BACKLOG: usize = 256;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque listener identifier, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for ListenerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiving end of one listener's audio.
///
/// The registry keeps the write side. Dropping or closing this stream ends the
/// write side, and the listener is pruned on the next broadcast tick. A stream
/// that stops reading is pruned once its backlog is full; it can still drain
/// what was queued and then ends.
#[derive(Debug)]
pub struct ListenerStream {
    id: ListenerId,
    rx: mpsc::Receiver<Bytes>,
}

impl ListenerStream {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next broadcast chunk.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Take the next already-delivered chunk without waiting.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    /// Close the write side while keeping already-delivered chunks readable.
    pub fn close(&mut self) {
        self.rx.close();
    }

    pub fn into_inner(self) -> mpsc::Receiver<Bytes> {
        self.rx
    }
}

pub(crate) type ListenerMap = HashMap<ListenerId, mpsc::Sender<Bytes>>;

/// Set of currently connected listeners, keyed by [`ListenerId`].
///
/// Registration happens on the connection path while the broadcast tick
/// iterates from a pipeline thread; both go through the same mutex so removal
/// never races an in-flight iteration.
#[derive(Debug)]
pub struct ListenerRegistry {
    streams: Mutex<ListenerMap>,
    backlog: usize,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::with_backlog(DEFAULT_LISTENER_BACKLOG)
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose listeners may queue at most `backlog` chunks.
    pub fn with_backlog(backlog: usize) -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            backlog: backlog.max(1),
        }
    }

    pub fn backlog(&self) -> usize {
        self.backlog
    }

    /// Allocate a fresh id and open stream, and start delivering to it.
    pub fn register(&self) -> (ListenerId, ListenerStream) {
        let id = ListenerId::new();
        let (tx, rx) = mpsc::channel(self.backlog);
        self.streams.lock().unwrap().insert(id, tx);
        (id, ListenerStream { id, rx })
    }

    /// Remove a listener. Unknown ids are ignored.
    ///
    /// # Returns
    /// `true` if the listener was still registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        self.streams.lock().unwrap().remove(&id).is_some()
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.streams.lock().unwrap().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.streams.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ListenerMap> {
        self.streams.lock().unwrap()
    }
}
