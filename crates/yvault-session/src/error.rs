use thiserror::Error;

/// Errors from a yvault session.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the yvault-format crate.
    #[error(transparent)]
    Format(#[from] yvault_format::Error),

    /// The two new-password prompts did not match.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// The new password equals the current one.
    #[error("new password is the same as the current password")]
    NoChange,

    /// Rotation was requested on a document that is not encrypted.
    #[error("document is not encrypted, there is no password to rotate")]
    NothingToRotate,

    /// Two requested options cannot be combined.
    #[error("'{first}' cannot be used with '{second}'")]
    IncompatibleOptions {
        /// The first conflicting option.
        first: &'static str,
        /// The second conflicting option.
        second: &'static str,
    },

    /// An empty password was entered.
    #[error("empty password not allowed")]
    EmptyPassword,

    /// The external editor could not be run.
    #[error("editor error: {0}")]
    Editor(String),

    /// A `--set` key path is malformed.
    #[error("invalid key path: {0}")]
    InvalidKeyPath(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error comes from rejected command-line options.
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::IncompatibleOptions { .. })
    }
}

/// Result type for yvault-session operations.
pub type Result<T> = std::result::Result<T, Error>;
