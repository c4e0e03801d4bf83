//! Collabdesk Common - Shared types and utilities
//!
//! This crate provides the configuration, error taxonomy and shared
//! identifier/enum types used by every Collabdesk component.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
