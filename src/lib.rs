#![deny(missing_docs)]
//! Oxide Media Relay library.
//!
//! Telegram bot that takes a link from a chat message, downloads the
//! referenced video, audio track or image and sends the file back.

/// Telegram-specific bot/transport implementation.
pub mod bot;
/// Configuration management.
pub mod config;
/// Error taxonomy for the relay pipeline.
pub mod error;
/// Link extraction, classification, fetching and size checks.
pub mod media;
/// Per-message relay pipeline.
pub mod relay;
/// Telegram runtime entrypoint.
pub mod runner;
/// Utility functions.
pub mod utils;
