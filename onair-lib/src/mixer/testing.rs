//! Deterministic [`Mixer`] double for engine tests.

use std::io::{self, Cursor, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{MergeFailure, Mixer};
use crate::error::MixerError;
use crate::Source;

/// Probes to a scripted bit rate and "merges" by emitting a marker followed
/// by the untouched base stream.
pub(crate) struct FakeMixer {
    bit_rate: Mutex<Result<u64, String>>,
    marker: Vec<u8>,
    fail_merge: bool,
    probes: AtomicUsize,
    merges: AtomicUsize,
}

impl FakeMixer {
    pub(crate) fn with_bit_rate(bit_rate: u64) -> Self {
        Self {
            bit_rate: Mutex::new(Ok(bit_rate)),
            marker: vec![0xFF; 16],
            fail_merge: false,
            probes: AtomicUsize::new(0),
            merges: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_probe(stderr: &str) -> Self {
        let mixer = Self::with_bit_rate(0);
        *mixer.bit_rate.lock().unwrap() = Err(stderr.to_string());
        mixer
    }

    pub(crate) fn failing_merge(mut self) -> Self {
        self.fail_merge = true;
        self
    }

    pub(crate) fn set_bit_rate(&self, bit_rate: u64) {
        *self.bit_rate.lock().unwrap() = Ok(bit_rate);
    }

    pub(crate) fn marker(&self) -> &[u8] {
        &self.marker
    }

    pub(crate) fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub(crate) fn merges(&self) -> usize {
        self.merges.load(Ordering::SeqCst)
    }
}

impl Mixer for FakeMixer {
    fn probe_bit_rate(&self, _path: &Path) -> Result<u64, MixerError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.bit_rate.lock().unwrap().clone().map_err(MixerError::Probe)
    }

    fn merge(&self, base: Source, _effect: &Path) -> Result<Source, MergeFailure> {
        self.merges.fetch_add(1, Ordering::SeqCst);
        if self.fail_merge {
            return Err(MergeFailure {
                error: MixerError::Spawn {
                    program: "fake-mixer".to_string(),
                    source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
                },
                base,
            });
        }
        Ok(Box::new(Cursor::new(self.marker.clone()).chain(base)))
    }
}
