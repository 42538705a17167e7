//! Printdrop server library.
//!
//! Customers upload documents for a store; the store prints them within a
//! fixed time window, after which the order and its files are removed. This
//! crate provides the HTTP surface, services and backends as a library so
//! they can be tested and driven from the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;

pub use routes::app;
pub use state::AppState;
