//! Real-time pacing between a byte source and the broadcast sink.
//!
//! A [`Throttle`] is created already wired to a [`BroadcastSink`]. Attaching a
//! source spawns a feed thread that reads chunks and releases them to the sink
//! no faster than the configured byte rate, so the reader is held to playback
//! speed even with slow or zero listeners.
//!
//! - this module owns the gate state shared with the feed thread (pause, end,
//!   detach requests, pacing window);
//! - [`feed`] runs the read/admit/consume loop.

mod feed;

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::broadcast::BroadcastSink;
use crate::Source;

/// Handle to one rate-limited pipeline stage.
///
/// Clones share the same gate; the attached source is owned by the feed thread.
#[derive(Clone)]
pub struct Throttle {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    bytes_per_second: u64,
    chunk_size: usize,
    sink: BroadcastSink,
    state: Mutex<GateState>,
    wake: Condvar,
}

struct GateState {
    paused: bool,
    ended: bool,
    attached: bool,
    detach: Option<SyncSender<Source>>,
    window_start: Instant,
    window_bytes: u64,
    bytes_sent: u64,
}

/// Outcome of asking the gate to release a chunk.
pub(crate) enum Gate {
    Open,
    Detach(SyncSender<Source>),
    Ended,
}

impl Throttle {
    /// Create a throttle releasing `bytes_per_second` into `sink`.
    pub fn new(bytes_per_second: u64, chunk_size: usize, sink: BroadcastSink) -> Self {
        Self {
            shared: Arc::new(Shared {
                bytes_per_second: bytes_per_second.max(1),
                chunk_size: chunk_size.max(1),
                sink,
                state: Mutex::new(GateState {
                    paused: false,
                    ended: false,
                    attached: false,
                    detach: None,
                    window_start: Instant::now(),
                    window_bytes: 0,
                    bytes_sent: 0,
                }),
                wake: Condvar::new(),
            }),
        }
    }

    /// Start feeding `source` through the throttle on a dedicated thread.
    ///
    /// # Errors
    /// Hands the source back if the throttle already ended or already has a
    /// source attached.
    pub fn attach(&self, source: Source) -> std::result::Result<(), Source> {
        let mut state = self.shared.state.lock().unwrap();
        if state.ended || state.attached {
            return Err(source);
        }
        state.attached = true;
        state.window_start = Instant::now();
        state.window_bytes = 0;
        drop(state);

        let shared = self.shared.clone();
        thread::spawn(move || feed::run(shared, source));
        Ok(())
    }

    /// Stop releasing bytes. The feed thread blocks before its next chunk.
    pub fn pause(&self) {
        self.shared.state.lock().unwrap().paused = true;
        debug!("throttle paused");
    }

    /// Resume after [`Throttle::pause`]. Pacing restarts from now, so the
    /// paused interval is not released as a burst.
    pub fn resume(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if !state.paused {
            return;
        }
        state.paused = false;
        state.window_start = Instant::now();
        state.window_bytes = 0;
        self.shared.wake.notify_all();
        debug!("throttle resumed");
    }

    /// Terminate the throttle. The feed thread exits without waiting for an
    /// in-flight read, dropping its source. Ending twice is a no-op.
    pub fn end(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if state.ended {
            return;
        }
        state.ended = true;
        self.shared.wake.notify_all();
        debug!("throttle ended after {} bytes", state.bytes_sent);
    }

    /// Ask the feed thread to hand its source back.
    ///
    /// The returned [`Detach`] completes once the feed thread has stopped
    /// writing to the sink. Any chunk it already read but did not release is
    /// put back in front of the returned source.
    pub fn detach(&self) -> Detach {
        let (tx, rx) = mpsc::sync_channel(1);
        let mut state = self.shared.state.lock().unwrap();
        if state.attached && !state.ended {
            state.detach = Some(tx);
            self.shared.wake.notify_all();
        }
        drop(state);

        Detach {
            shared: self.shared.clone(),
            rx,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.shared.state.lock().unwrap().ended
    }

    pub fn is_paused(&self) -> bool {
        self.shared.state.lock().unwrap().paused
    }

    pub fn is_attached(&self) -> bool {
        self.shared.state.lock().unwrap().attached
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.shared.bytes_per_second
    }

    /// Total bytes released to the sink.
    pub fn bytes_sent(&self) -> u64 {
        self.shared.state.lock().unwrap().bytes_sent
    }

    /// Return true if both handles drive the same pipeline stage.
    pub fn same_as(&self, other: &Throttle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

/// Pending hand-back of a throttle's source, see [`Throttle::detach`].
pub struct Detach {
    shared: Arc<Shared>,
    rx: Receiver<Source>,
}

impl Detach {
    /// Block until the feed thread confirms detachment.
    ///
    /// # Returns
    /// The source, or `None` if nothing was attached or the feed thread did
    /// not respond within `timeout`. On timeout the request is withdrawn and
    /// the feed thread keeps its source.
    pub fn wait(self, timeout: Duration) -> Option<Source> {
        match self.rx.recv_timeout(timeout) {
            Ok(source) => Some(source),
            Err(RecvTimeoutError::Disconnected) => None,
            Err(RecvTimeoutError::Timeout) => {
                let withdrawn = self.shared.state.lock().unwrap().detach.take().is_some();
                if withdrawn {
                    None
                } else {
                    // The feed thread took the request before we could withdraw it.
                    self.rx.recv().ok()
                }
            }
        }
    }
}

impl Shared {
    /// Non-blocking check made before every read.
    fn interrupt(&self) -> Option<Gate> {
        let mut state = self.state.lock().unwrap();
        if state.ended {
            return Some(Gate::Ended);
        }
        if let Some(reply) = state.detach.take() {
            state.attached = false;
            return Some(Gate::Detach(reply));
        }
        None
    }

    /// Wait until `len` bytes may be released.
    fn admit(&self, len: usize) -> Gate {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.ended {
                return Gate::Ended;
            }
            if let Some(reply) = state.detach.take() {
                state.attached = false;
                return Gate::Detach(reply);
            }
            if state.paused {
                state = self.wake.wait(state).unwrap();
                continue;
            }

            let due = state.window_start
                + Duration::from_secs_f64(state.window_bytes as f64 / self.bytes_per_second as f64);
            let now = Instant::now();
            if due > now {
                state = self.wake.wait_timeout(state, due - now).unwrap().0;
                continue;
            }

            state.window_bytes += len as u64;
            state.bytes_sent += len as u64;
            return Gate::Open;
        }
    }

    /// Release the feed thread's claim on the throttle.
    ///
    /// An exhausted source ends the throttle. A detach request that raced the
    /// exit still gets the (possibly drained) source back.
    fn retire(&self, source: Source, exhausted: bool) {
        let mut state = self.state.lock().unwrap();
        state.attached = false;
        if exhausted {
            state.ended = true;
        }
        let reply = state.detach.take();
        self.wake.notify_all();
        drop(state);

        if let Some(reply) = reply {
            let _ = reply.send(source);
        }
    }

    fn bytes_sent(&self) -> u64 {
        self.state.lock().unwrap().bytes_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{ListenerRegistry, ListenerStream};
    use std::io::{Cursor, Read};

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn wired() -> (Arc<ListenerRegistry>, BroadcastSink, ListenerStream) {
        let registry = Arc::new(ListenerRegistry::new());
        let sink = BroadcastSink::new(registry.clone());
        let (_, stream) = registry.register();
        (registry, sink, stream)
    }

    fn drain(stream: &mut ListenerStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.try_recv() {
            out.extend_from_slice(&chunk);
        }
        out
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn releases_no_faster_than_byte_rate() {
        let (_registry, sink, mut stream) = wired();
        let throttle = Throttle::new(10_000, 1000, sink);
        let data = pattern(5000);

        let start = Instant::now();
        throttle
            .attach(Box::new(Cursor::new(data.clone())))
            .map_err(|_| "attach")
            .unwrap();
        assert!(wait_until(Duration::from_secs(3), || throttle.is_ended()));

        // Five chunks at 1000 bytes each: the last is due 400ms after the first.
        assert!(start.elapsed() >= Duration::from_millis(350));
        assert_eq!(drain(&mut stream), data);
        assert_eq!(throttle.bytes_sent(), 5000);
    }

    #[test]
    fn pause_holds_output_until_resume() {
        let (_registry, sink, mut stream) = wired();
        let throttle = Throttle::new(200_000, 100, sink);
        throttle
            .attach(Box::new(Cursor::new(pattern(1_000_000))))
            .map_err(|_| "attach")
            .unwrap();

        thread::sleep(Duration::from_millis(50));
        throttle.pause();
        thread::sleep(Duration::from_millis(30));
        let before = drain(&mut stream).len();
        assert!(before > 0);

        thread::sleep(Duration::from_millis(100));
        assert!(drain(&mut stream).is_empty());

        throttle.resume();
        assert!(wait_until(Duration::from_secs(1), || stream.try_recv().is_some()));
        throttle.end();
    }

    #[test]
    fn end_is_idempotent_and_refuses_new_sources() {
        let (_registry, sink, _stream) = wired();
        let throttle = Throttle::new(1000, 100, sink);

        throttle.end();
        throttle.end();

        assert!(throttle.is_ended());
        assert!(throttle.attach(Box::new(Cursor::new(pattern(10)))).is_err());
    }

    #[test]
    fn detach_hands_back_exactly_the_unsent_bytes() {
        let (_registry, sink, mut stream) = wired();
        let throttle = Throttle::new(20_000, 1000, sink);
        let data = pattern(40_000);
        throttle
            .attach(Box::new(Cursor::new(data.clone())))
            .map_err(|_| "attach")
            .unwrap();

        thread::sleep(Duration::from_millis(200));
        throttle.pause();
        let mut rest = throttle
            .detach()
            .wait(Duration::from_secs(1))
            .expect("source handed back");
        assert!(!throttle.is_attached());

        let mut remainder = Vec::new();
        rest.read_to_end(&mut remainder).expect("read remainder");
        let mut seen = drain(&mut stream);
        assert!(!seen.is_empty());
        assert!(!remainder.is_empty());

        seen.extend_from_slice(&remainder);
        assert_eq!(seen, data);
    }

    #[test]
    fn detach_without_source_fails_fast() {
        let (_registry, sink, _stream) = wired();
        let throttle = Throttle::new(1000, 100, sink);

        let start = Instant::now();
        assert!(throttle.detach().wait(Duration::from_secs(2)).is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
