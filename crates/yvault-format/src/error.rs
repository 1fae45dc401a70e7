use thiserror::Error;

/// Errors that can occur when loading or dumping vault documents.
#[derive(Debug, Error)]
pub enum Error {
    /// Decryption failed its integrity check (wrong password or tampered data).
    #[error("invalid vault password or corrupted ciphertext")]
    InvalidCredential,

    /// The ciphertext envelope is not in a format this crate understands.
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// A speculative decode produced no usable content.
    #[error("decoded document is empty")]
    EmptyResult,

    /// No encoding could decode the input.
    #[error("unrecognized document format")]
    UnrecognizedFormat,

    /// `Full` decoding was requested for input without the vault sentinel.
    #[error("input is not a vault envelope")]
    NotEncrypted,

    /// The top level of the document is not a mapping.
    #[error("document root must be a mapping, found {0}")]
    NotAMapping(&'static str),

    /// A mapping key is not a string.
    #[error("mapping keys must be strings, found {0}")]
    NonStringKey(String),

    /// A key path runs through a value that is not a mapping.
    #[error("invalid key path: {0}")]
    PathConflict(String),

    /// The requested output format cannot represent this encoding.
    #[error("unsupported output: {0}")]
    Unsupported(String),

    /// The document text is not valid UTF-8.
    #[error("document is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Encryption error from the cipher primitive.
    #[error("encryption error: {0}")]
    Encrypt(String),

    /// The password could not be obtained.
    #[error("password prompt failed: {0}")]
    Prompt(String),

    /// YAML parsing or rendering error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON rendering error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error only means "this encoding produced nothing" and
    /// another encoding may still succeed.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Error::EmptyResult | Error::NotEncrypted)
    }
}

/// Result type for yvault-format operations.
pub type Result<T> = std::result::Result<T, Error>;
