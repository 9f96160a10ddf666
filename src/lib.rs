//! SoulPilot command line application.
//!
//! Loads configuration, bootstraps logging and metrics, and drives the
//! resolution and action crates against a Chromium instance.

pub mod app;
pub mod config;
pub mod runtime;

pub use app::Engine;
pub use config::Config;
