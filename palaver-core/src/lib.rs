//! Core types and utilities for palaver
//!
//! This crate provides the foundational types, configuration and logging
//! used by all other palaver components.

pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use error::{Error, Result};
