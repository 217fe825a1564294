//! Operator command dispatch.

use log::info;

use super::BroadcastEngine;
use crate::error::Result;

/// Parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    /// Anything else names an effect.
    Effect(String),
}

impl Command {
    /// Case-fold `text` and classify it by substring.
    pub fn parse(text: &str) -> Self {
        let command = text.trim().to_lowercase();
        if command.contains("start") {
            Self::Start
        } else if command.contains("stop") {
            Self::Stop
        } else {
            Self::Effect(command)
        }
    }
}

impl BroadcastEngine {
    /// Run a free-text command from the control surface.
    ///
    /// # Errors
    /// Propagates the error of the engine operation the command maps to.
    pub fn handle_command(&self, text: &str) -> Result<Command> {
        info!("command received: {}", text);
        let command = Command::parse(text);
        match &command {
            Command::Start => self.start()?,
            Command::Stop => self.stop(),
            Command::Effect(name) => {
                self.splice_effect(name)?;
            }
        }
        Ok(command)
    }
}
