//! # yvault-session
//!
//! Viewing, editing and re-encrypting password-protected YAML documents.
//!
//! This crate provides:
//! - Session lifecycle: open, rotate password, edit, set, render
//! - Password prompting (terminal or `YVAULT_PASSWORD`)
//! - External editor invocation through a private scratch file
//! - Validation of requested option combinations
//! - Atomic write-back
//!
//! ## Example
//!
//! ```ignore
//! use yvault_session::{run, CommandEditor, Options, Outcome, TerminalPrompt};
//! use yvault_format::Encoding;
//!
//! let options = Options {
//!     mode: Some(Encoding::Mixed),
//!     in_place: true,
//!     ..Options::new("secrets.yml")
//! };
//! let mut editor = CommandEditor::from_env()?;
//! match run(&options, TerminalPrompt, &mut editor)? {
//!     Outcome::Written(path) => println!("wrote {}", path.display()),
//!     Outcome::Emitted(bytes) => print!("{}", String::from_utf8_lossy(&bytes)),
//! }
//! ```

mod editor;
mod error;
mod options;
mod prompt;
mod session;
mod writeback;

pub use editor::{CommandEditor, Editor, ScratchFile, DEFAULT_EDITOR};
pub use error::{Error, Result};
pub use options::Options;
pub use prompt::{PasswordKind, PasswordPrompt, ScriptedPrompt, TerminalPrompt, PASSWORD_ENV_VAR};
pub use session::{run, Outcome, Session};
pub use writeback::write_atomic;

// Re-export yvault-format types for convenience
pub use yvault_format::{Document, Encoding, Format, SecretString, Value};
