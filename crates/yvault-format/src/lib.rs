//! # yvault-format
//!
//! Core library for reading and writing password-protected YAML documents.
//!
//! A document is stored in one of three encodings:
//! - `Plain` (`clear`): ordinary YAML, no ciphertext
//! - `Mixed` (`mixed`): YAML whose leaves are individually encrypted and
//!   tagged `!vault`, keys and nesting stay readable
//! - `Full` (`vault`): the whole document is a single ciphertext envelope
//!
//! This crate provides:
//! - Encoding detection from sentinel markers
//! - Scalar typing for hand-edited YAML
//! - The `!vault` marker transform around the YAML parser/writer
//! - Loading any encoding into a [`Document`] and dumping it into any other
//!
//! ## Example
//!
//! ```ignore
//! use yvault_format::{codec, Encoding};
//! use secrecy::SecretString;
//!
//! let mut password = SecretString::new("hunter2".to_string());
//! let raw = std::fs::read("secrets.yml")?;
//! let (doc, encoding) = codec::probe(&raw, &mut password)?;
//!
//! // Re-encode with every value encrypted, keys left readable
//! let mixed = codec::dump(&doc, Encoding::Mixed, &mut password)?;
//! ```

pub mod cipher;
pub mod codec;
mod detect;
mod document;
mod error;
pub mod marker;
pub mod typer;

pub use cipher::VAULT_SENTINEL;
pub use codec::{Format, NoPassword, PasswordProvider};
pub use detect::{classify, Encoding};
pub use document::{Document, Value};
pub use error::{Error, Result};

// Re-export secrecy so callers share the password type
pub use secrecy::{ExposeSecret, SecretString};
