//! # Common library
//!
//! This crate contains the shared [`Config`] struct used to configurate
//! services within the workspace, along with logging initialization helpers.
//!
//! [`Config`]: config::Config

/// Shared workspace configuration.
pub mod config;

/// Logging utilities.
#[cfg(feature = "logging")]
pub mod logging;
