//! # Playdock Core
//!
//! Core types, configuration, and storage for Playdock.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - Identifier types shared by the gateway and CLI
//! - The sled-backed game library store

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod games;
pub mod types;

pub use config::{AuthConfig, BindMode, Config, ConfigError, GatewayConfig, HashingConfig};
pub use games::{Game, GameDraft, GamePatch, GameStore, GameStoreError};
pub use types::{GameId, UserId};
