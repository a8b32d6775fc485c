//! `px-domain` — shared configuration and error types for the praxis
//! session client crates.

pub mod config;
pub mod error;

pub use error::{Error, Result};
