//! Live effect splicing.
//!
//! Ordering matters here. The replacement throttle is wired to the sink
//! before the old one is touched, and the old source is only handed to the
//! mixer after its feed thread has confirmed it stopped writing. Listeners
//! therefore never see bytes from both pipelines interleaved, and no byte
//! read from the old source is lost.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, info, warn};

use super::BroadcastEngine;
use crate::effects;
use crate::error::{EngineError, Result};
use crate::mixer::MergeFailure;
use crate::throttle::Throttle;

/// Keeps the engine reporting `Splicing` for the lifetime of the guard.
struct SplicingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SplicingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self { flag }
    }
}

impl Drop for SplicingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl BroadcastEngine {
    /// Mix the effect matching `effect_name` into the running broadcast.
    ///
    /// # Returns
    /// The resolved effect file.
    ///
    /// # Errors
    /// - [`EngineError::EffectNotFound`]: nothing changes.
    /// - [`EngineError::NotStreaming`]: no pipeline to splice into.
    /// - [`EngineError::DetachTimeout`]: the old pipeline keeps running.
    /// - [`EngineError::Mixer`]: the old source keeps playing, unmixed, on
    ///   the replacement throttle.
    pub fn splice_effect(&self, effect_name: &str) -> Result<PathBuf> {
        let effect = effects::find_effect(&self.config.fx_dir, effect_name)?;

        let mut playback = self.playback.lock().unwrap();
        let Some(old) = playback.streaming().cloned() else {
            return Err(EngineError::NotStreaming);
        };
        let _splicing = SplicingGuard::enter(&self.splicing);
        info!("splicing {} into the broadcast", effect.display());

        let fresh = Throttle::new(
            old.bytes_per_second(),
            self.config.chunk_size,
            self.sink.clone(),
        );

        old.pause();
        let detach_timeout = self.config.detach_timeout();
        let Some(source) = old.detach().wait(detach_timeout) else {
            warn!("source did not detach, resuming the previous pipeline");
            fresh.end();
            old.resume();
            return Err(EngineError::DetachTimeout(detach_timeout));
        };
        old.end();

        let (source, outcome) = match self.mixer.merge(source, &effect) {
            Ok(merged) => (merged, Ok(effect)),
            Err(MergeFailure { error, base }) => {
                error!(
                    "mixing {} failed: {}; resuming without the effect",
                    effect.display(),
                    error
                );
                (base, Err(EngineError::Mixer(error)))
            }
        };

        if fresh.attach(source).is_err() {
            warn!("replacement throttle refused the spliced source");
        }
        playback.replace_throttle(fresh);

        if let Ok(effect) = &outcome {
            info!("added fx to broadcast: {}", effect.display());
        }
        outcome
    }
}
