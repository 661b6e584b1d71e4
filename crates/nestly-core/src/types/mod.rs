//! Core type definitions used across the Nestly workspace.

pub mod id;

pub use id::*;
