//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - SessionStore: durable per-session records and the append-only audit trail
//!
//! These traits define the contracts that allow the domain to be independent
//! of specific infrastructure implementations.

pub mod session_store;

pub use session_store::SessionStore;
