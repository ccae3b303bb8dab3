//! Infrastructure layer module
//!
//! Configuration loading and logging setup for hosts of the quality loop.

pub mod config;
pub mod logging;
