//! # nestly-core
//!
//! Core crate for the Nestly realtime client. Contains configuration
//! schemas, string-backed typed identifiers, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Nestly crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
