//! PopFlix Core - Shared domain types.
//!
//! This crate provides the types used across all PopFlix components:
//! - `client` - Session, entitlement and interaction layer over the remote service
//! - `cli` - Headless command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no
//! persistence. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Catalog content, sessions, interaction records and payments

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
