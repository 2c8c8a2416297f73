//! # easl-core
//!
//! Core types shared by the EASL toolchain crates: the top-level error type,
//! `easl.toml` configuration and content hashing used by the watcher.

pub mod config;
pub mod error;
pub mod hash;

pub use config::*;

pub use error::{EaslError, EaslResult};
pub use hash::ContentHash;
