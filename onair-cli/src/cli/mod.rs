pub mod args;
pub mod settings;
