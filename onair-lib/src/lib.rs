//! # Onair Broadcast Library
//!
//! This library provides the broadcast core of the onair live audio server.
//! A single upstream track is paced to real-time speed and fanned out to
//! every connected listener, and short effects can be spliced into the live
//! stream through an external mixer process without dropping listeners.

pub mod broadcast;
pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod listener;
pub mod mixer;
pub mod throttle;

pub use broadcast::BroadcastSink;
pub use config::BroadcastConfig;
pub use engine::{BroadcastEngine, Command, EngineState};
pub use error::{ConfigError, EngineError, MixerError, Result};
pub use listener::{ListenerId, ListenerRegistry, ListenerStream};
pub use mixer::{MergeFailure, Mixer, SoxMixer};
pub use throttle::Throttle;

/// Owned byte source feeding a pipeline (track file, merged mixer output, ...).
pub type Source = Box<dyn std::io::Read + Send>;
