//! # stemchat Common Library
//!
//! Shared code for the stemchat service crates:
//! - Error type used by configuration and bootstrap code
//! - TOML bootstrap configuration and root folder resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
