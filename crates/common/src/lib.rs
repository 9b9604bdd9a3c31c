//! Shared identifiers, message types, and error definitions used across all
//! otis crates.

pub mod error;
pub mod types;

pub use error::{Error, FromMessage, Result};
