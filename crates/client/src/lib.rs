//! PopFlix headless client.
//!
//! Session, entitlement and interaction layer for the PopFlix streaming
//! catalog. Front ends build a [`PopflixClient`], call
//! [`SessionManager::initialize`](services::SessionManager::initialize) once,
//! then drive the services it exposes.
//!
//! # Modules
//!
//! - [`api`] - Remote service contract and its HTTP implementation
//! - [`store`] - Durable credential storage
//! - [`entitlement`] - Pure access decisions over a session
//! - [`services`] - Session, catalog, interaction and checkout services
//! - [`config`] - Environment configuration
//! - [`error`] - Error taxonomy and Sentry helpers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod client;
pub mod config;
pub mod entitlement;
pub mod error;
pub mod services;
pub mod store;

pub use client::PopflixClient;
pub use config::{ApiConfig, ClientConfig, ConfigError, SentryConfig};
pub use error::{ClientError, DenialReason};
