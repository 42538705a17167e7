//! PrintDrop Core - Shared domain types.
//!
//! This crate provides the types shared by every PrintDrop component:
//! - `server` - Upload, order lifecycle and print retrieval HTTP service
//! - `cli` - Migrations, manual reaper sweeps and store management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Storage keys, the order status state machine and
//! TTL arithmetic live here so that every component agrees on them.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, store codes, emails, statuses, file metadata,
//!   storage keys and order lifetime helpers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
