//! Use cases wired from configuration

pub mod poem_service;

pub use poem_service::{build_backend, PoemService};
