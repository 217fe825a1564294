//! External audio mixer capability.
//!
//! The engine never touches audio samples itself. Bit-rate probing and effect
//! merging are delegated to a [`Mixer`], normally [`SoxMixer`] driving the
//! `sox` binary over stdin/stdout.

mod sox;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt::{Debug, Formatter};
use std::path::Path;

pub use sox::SoxMixer;

use crate::error::MixerError;
use crate::Source;

/// Probe and merge operations the broadcast engine needs from a mixer.
pub trait Mixer: Send + Sync {
    /// Query the nominal bit rate (bits per second) of an audio file.
    fn probe_bit_rate(&self, path: &Path) -> Result<u64, MixerError>;

    /// Merge `base` with the effect at `effect` into one output stream.
    ///
    /// The merge is stream-to-stream: `base` is consumed as the returned
    /// stream is read.
    ///
    /// # Errors
    /// On failure the unconsumed part of `base` is handed back inside
    /// [`MergeFailure`] so the caller can keep broadcasting it.
    fn merge(&self, base: Source, effect: &Path) -> Result<Source, MergeFailure>;
}

/// Failed merge, carrying back the base stream it was given.
pub struct MergeFailure {
    pub error: MixerError,
    pub base: Source,
}

impl Debug for MergeFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeFailure")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Parse a probed bit rate such as `128k`, `1.41M` or `96000`.
///
/// # Errors
/// Returns [`MixerError::UnparsableBitRate`] for empty, non-numeric or
/// zero values, or an unknown unit suffix.
pub fn parse_bit_rate(text: &str) -> Result<u64, MixerError> {
    let trimmed = text.trim();
    let invalid = || MixerError::UnparsableBitRate(trimmed.to_string());

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let multiplier = match unit.trim() {
        "" => 1.0,
        "k" | "K" => 1_000.0,
        "M" => 1_000_000.0,
        "G" => 1_000_000_000.0,
        _ => return Err(invalid()),
    };

    let value: f64 = number.parse().map_err(|_| invalid())?;
    let bit_rate = (value * multiplier).round() as u64;
    if bit_rate == 0 {
        return Err(invalid());
    }
    Ok(bit_rate)
}
