//! Playback state owned by the engine.

use std::path::{Path, PathBuf};

use crate::throttle::Throttle;

/// Externally visible engine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Never started.
    Idle,
    Streaming,
    /// An effect is being spliced into the running broadcast.
    Splicing,
    /// Stopped by command or because the track ran out.
    Stopped,
}

/// Current track and the single active pipeline stage.
///
/// The active source is owned by the current throttle's feed thread, so
/// holding exactly one current [`Throttle`] here is what keeps a single
/// readable driving the broadcast.
pub(crate) struct PlaybackState {
    track: PathBuf,
    current: Option<Throttle>,
    started: bool,
}

impl PlaybackState {
    pub(crate) fn new(track: PathBuf) -> Self {
        Self {
            track,
            current: None,
            started: false,
        }
    }

    pub(crate) fn track(&self) -> &Path {
        &self.track
    }

    /// Make `throttle` the active pipeline for a freshly started track.
    ///
    /// The previous stage must already be ended; two attached stages would
    /// interleave their bytes in the sink.
    pub(crate) fn install(&mut self, throttle: Throttle) {
        self.started = true;
        self.current = Some(throttle);
    }

    /// Swap the active stage mid-track, after the old one handed back its
    /// source.
    pub(crate) fn replace_throttle(&mut self, throttle: Throttle) {
        self.current = Some(throttle);
    }

    pub(crate) fn current(&self) -> Option<&Throttle> {
        self.current.as_ref()
    }

    /// The active stage, if it is still flowing.
    pub(crate) fn streaming(&self) -> Option<&Throttle> {
        self.current.as_ref().filter(|throttle| !throttle.is_ended())
    }

    pub(crate) fn state(&self) -> EngineState {
        match &self.current {
            None if !self.started => EngineState::Idle,
            None => EngineState::Stopped,
            Some(throttle) if throttle.is_ended() => EngineState::Stopped,
            Some(_) => EngineState::Streaming,
        }
    }
}
