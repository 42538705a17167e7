//! Core types for PrintDrop.
//!
//! This module provides type-safe wrappers for the domain concepts shared by
//! the upload pipeline, the reaper and the print retrieval pipeline.

pub mod email;
pub mod file;
pub mod id;
pub mod lifetime;
pub mod status;
pub mod storage_key;
pub mod store_code;

pub use email::{Email, EmailError};
pub use file::{ColorMode, FileKind, FileRef, PageSize, PrintSettings};
pub use id::*;
pub use lifetime::{Clock, ManualClock, OrderTtl, SystemClock};
pub use status::*;
pub use storage_key::{StorageKey, StorageKeyError};
pub use store_code::{StoreCode, StoreCodeError};
