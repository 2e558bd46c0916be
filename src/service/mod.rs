//! Service layer — the caller-facing operations of the subsystem.
//!
//! This module provides:
//! - `SecretService` with the protect/reveal helpers and CRUD/export
//!   operations (`secrets`)
//! - The key rotation orchestrator and the per-user exclusive-section
//!   registry it requires (`rotation`)

pub mod rotation;
pub mod secrets;

// Re-export the most commonly used items.
pub use rotation::{RotationGuard, UserLocks};
pub use secrets::{protect, reveal, SecretService};
