//! Safekeep — per-user secret protection for a personal data vault.
//!
//! This crate implements the one subsystem of the vault with real
//! design stakes: the authenticated-encryption envelope used to store
//! credential secrets at rest, and the key-rotation protocol that
//! re-encrypts everything a user owns under a fresh key without ever
//! leaving stored data unreadable or inconsistent.
//!
//! The surrounding web application (routing, sessions, notes and
//! bookmarks, file browsing) consumes it through [`SecretService`] and
//! the two store traits in [`store`].

pub mod audit;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod errors;
pub mod service;
pub mod store;

pub use config::Settings;
pub use domain::{ExportItem, RevealedSecret, SecretDraft, SecretListing, SecretRecord};
pub use errors::{Result, SafekeepError};
pub use service::{RotationGuard, SecretService, UserLocks};
pub use store::{ProtectedFields, SecretRecords, SqliteStore, UserKeys};
