//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the audio line engine:
//! - Logging and tracing infrastructure
//! - Configuration loading from a host settings store
//! - Line lifecycle event bus
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the playback crate depends on.
//! It establishes the logging conventions and event broadcasting mechanisms
//! used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
