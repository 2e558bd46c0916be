//! Cryptographic primitives for Safekeep.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - The nonce || ciphertext envelope codec (`envelope`)
//! - Per-user key generation and the zeroizing key wrapper (`keys`)

pub mod encryption;
pub mod envelope;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, generate_user_key, ...};
pub use encryption::{decrypt, encrypt, KEY_LEN, NONCE_LEN};
pub use keys::{generate_user_key, UserKey};
