//! Core integrations.

pub mod sts;

pub use sts::*;
