//! Broadcast orchestrator.
//!
//! The engine owns the one upstream pipeline (track -> throttle -> sink) and
//! recomposes it on `start`, `stop` and effect splices:
//! - [`state`] holds the current track and active throttle.
//! - [`splice`] implements the detach/merge/reattach protocol.
//! - [`command`] maps free-text operator commands onto engine calls.
//!
//! Every operation takes the playback lock for its whole duration, so start,
//! stop and splices never overlap.

mod command;
mod splice;
mod state;

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};

pub use command::Command;
pub use state::EngineState;

use crate::broadcast::BroadcastSink;
use crate::config::BroadcastConfig;
use crate::error::{EngineError, MixerError, Result};
use crate::listener::{ListenerId, ListenerRegistry, ListenerStream};
use crate::mixer::{Mixer, SoxMixer};
use crate::throttle::Throttle;
use state::PlaybackState;

/// Live broadcast engine shared by the HTTP layer.
pub struct BroadcastEngine {
    config: BroadcastConfig,
    sink: BroadcastSink,
    mixer: Arc<dyn Mixer>,
    playback: Mutex<PlaybackState>,
    splicing: AtomicBool,
    // Rates are read by diagnostics without the playback lock, which a
    // splice holds through its detach and merge waits. Zero means unset.
    bit_rate: AtomicU64,
    bytes_per_second: AtomicU64,
}

impl BroadcastEngine {
    /// Create an idle engine using `mixer` for probing and merging.
    pub fn new(config: BroadcastConfig, mixer: Arc<dyn Mixer>) -> Self {
        let registry = Arc::new(ListenerRegistry::with_backlog(config.listener_backlog));
        Self {
            sink: BroadcastSink::new(registry),
            playback: Mutex::new(PlaybackState::new(config.track_path.clone())),
            mixer,
            config,
            splicing: AtomicBool::new(false),
            bit_rate: AtomicU64::new(0),
            bytes_per_second: AtomicU64::new(0),
        }
    }

    /// Create an idle engine backed by the configured `sox` binary.
    pub fn with_sox(config: BroadcastConfig) -> Self {
        let mixer = Arc::new(SoxMixer::new(&config));
        Self::new(config, mixer)
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        self.sink.registry()
    }

    /// Open a new listener stream that receives every following tick.
    pub fn register_listener(&self) -> (ListenerId, ListenerStream) {
        let (id, stream) = self.registry().register();
        debug!("listener {} registered", id);
        (id, stream)
    }

    /// Drop a listener. Unknown ids are ignored.
    pub fn unregister_listener(&self, id: ListenerId) -> bool {
        self.registry().unregister(id)
    }

    /// Start broadcasting the configured track from the beginning.
    ///
    /// The bit rate is probed on every start; probe failures fall back to the
    /// configured constant. A running pipeline is replaced, never duplicated.
    ///
    /// # Errors
    /// Returns [`EngineError::Track`] if the track cannot be opened. The
    /// running pipeline, if any, is left untouched in that case.
    pub fn start(&self) -> Result<()> {
        let mut playback = self.playback.lock().unwrap();
        let track = playback.track().to_path_buf();
        info!("starting with {}", track.display());

        let bit_rate = self.probe_bit_rate(&track);
        let file = File::open(&track).map_err(|source| EngineError::Track {
            path: track.clone(),
            source,
        })?;

        if let Some(previous) = playback.current() {
            if !previous.is_ended() {
                info!("replacing the running pipeline");
            }
            previous.end();
        }

        let bytes_per_second = self.config.bytes_per_second(bit_rate);
        let throttle = Throttle::new(bytes_per_second, self.config.chunk_size, self.sink.clone());
        if throttle.attach(Box::new(file)).is_err() {
            warn!("new throttle refused the track source");
        }
        playback.install(throttle);
        self.bit_rate.store(bit_rate, Ordering::SeqCst);
        self.bytes_per_second.store(bytes_per_second, Ordering::SeqCst);

        info!(
            "streaming at {} bit/s ({} bytes/s)",
            bit_rate, bytes_per_second
        );
        Ok(())
    }

    /// Terminate the running throttle. Listeners stay registered and get
    /// nothing until the next [`BroadcastEngine::start`]. Stopping twice is a
    /// no-op.
    pub fn stop(&self) {
        let playback = self.playback.lock().unwrap();
        match playback.streaming() {
            Some(throttle) => {
                info!("stopping broadcast");
                throttle.end();
            }
            None => debug!("stop requested while not streaming"),
        }
    }

    pub fn state(&self) -> EngineState {
        if self.splicing.load(Ordering::SeqCst) {
            return EngineState::Splicing;
        }
        self.playback.lock().unwrap().state()
    }

    /// Bit rate of the current track, once started. Never blocks.
    pub fn bit_rate(&self) -> Option<u64> {
        Some(self.bit_rate.load(Ordering::SeqCst)).filter(|&rate| rate > 0)
    }

    /// Byte rate of the active throttle, once started. Never blocks.
    pub fn bytes_per_second(&self) -> Option<u64> {
        Some(self.bytes_per_second.load(Ordering::SeqCst)).filter(|&rate| rate > 0)
    }

    fn probe_bit_rate(&self, track: &Path) -> u64 {
        let fallback = self.config.fallback_bit_rate;
        match self.mixer.probe_bit_rate(track) {
            Ok(bit_rate) => bit_rate,
            Err(err @ MixerError::Spawn { .. }) => {
                error!("{}; falling back to {} bit/s", err, fallback);
                fallback
            }
            Err(err) => {
                warn!("{}; falling back to {} bit/s", err, fallback);
                fallback
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn current_throttle(&self) -> Option<Throttle> {
        self.playback.lock().unwrap().current().cloned()
    }
}

impl Drop for BroadcastEngine {
    fn drop(&mut self) {
        if let Ok(playback) = self.playback.lock() {
            if let Some(throttle) = playback.current() {
                throttle.end();
            }
        }
    }
}
