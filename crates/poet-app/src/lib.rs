//! Application layer - config, intake state machine, sharing

pub mod app;
pub mod config;
pub mod intake;
pub mod scanner;
pub mod share;

pub use config::Config;
pub use intake::{IntakeController, IntakeError, Notice, Phase, UploadState};
