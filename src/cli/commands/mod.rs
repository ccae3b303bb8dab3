//! CLI command implementations.

pub mod check;
pub mod learn;
pub mod review;
pub mod score;
