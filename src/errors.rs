use thiserror::Error;

/// All errors that can occur in Safekeep.
#[derive(Debug, Error)]
pub enum SafekeepError {
    // --- Crypto errors ---
    #[error("Invalid encryption key — expected a {expected}-byte key, got {got} bytes")]
    InvalidKey { expected: usize, got: usize },

    #[error("The stored value cannot be decoded with the current key")]
    AuthenticationFailure,

    #[error("Malformed envelope — {0} bytes is too short for a nonce and ciphertext")]
    MalformedEnvelope(usize),

    #[error("Key generation failed: {0}")]
    KeyGenerationFailure(String),

    // --- Key store errors ---
    #[error("No encryption key on record for user '{0}'")]
    KeyUnavailable(String),

    // --- Record errors ---
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Secret '{0}' not found")]
    NotFound(String),

    #[error("A secret named '{0}' already exists")]
    AlreadyExists(String),

    // --- Rotation errors ---
    #[error("Key rotation already in progress for user '{0}'")]
    RotationInProgress(String),

    #[error("Key rotation aborted at secret '{secret_id}': {source}")]
    RotationAborted {
        secret_id: String,
        #[source]
        source: Box<SafekeepError>,
    },

    #[error(
        "Key swap failed for user '{user_id}' after re-encrypted secrets were persisted — \
         manual recovery required: {source}"
    )]
    KeySwapFailed {
        user_id: String,
        #[source]
        source: Box<SafekeepError>,
    },

    // --- Export errors ---
    #[error("Export aborted at secret '{secret_name}': {source}")]
    ExportAborted {
        secret_name: String,
        #[source]
        source: Box<SafekeepError>,
    },

    // --- Store errors ---
    #[error("Persistence error: {0}")]
    Persistence(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Convenience type alias for Safekeep results.
pub type Result<T> = std::result::Result<T, SafekeepError>;
