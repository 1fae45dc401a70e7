//! Cipher primitive and the self-describing ciphertext envelope.
//!
//! Every ciphertext blob, whether it wraps a whole document or a single
//! leaf, is stored as text:
//!
//! ```text
//! $YVAULT;1.0;AGE
//! 6167652d656e6372797074696f6e2e6f72672f76310a2d3e20736372797074...
//! ```
//!
//! The first line is the header (sentinel, format version, algorithm). The
//! body is hex, wrapped at 80 columns. Two algorithms exist:
//!
//! - `AGE`: an age passphrase-encrypted payload. Used for whole documents.
//! - `CHACHA20POLY1305`: `log_n || salt || nonce || ciphertext`, sealed with
//!   a key derived from the password by scrypt. Used for leaves, where one
//!   [`LeafSealer`] derives the key once and seals many values with it.
//!
//! Both are authenticated, so a wrong password or a flipped byte is
//! reported as [`Error::InvalidCredential`].

use crate::error::{Error, Result};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use secrecy::{ExposeSecret, Secret, SecretString};
use std::collections::HashMap;
use std::io::{Read, Write};

/// Fixed prefix identifying a ciphertext envelope.
pub const VAULT_SENTINEL: &str = "$YVAULT;";

/// Envelope format version written by this crate.
pub const VAULT_VERSION: &str = "1.0";

/// Cipher identifier for whole-document envelopes.
pub const VAULT_CIPHER: &str = "AGE";

/// Cipher identifier for leaf envelopes.
pub const LEAF_CIPHER: &str = "CHACHA20POLY1305";

const LINE_WIDTH: usize = 80;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// scrypt cost for leaf keys (N = 2^15, r = 8, p = 1).
const LEAF_LOG_N: u8 = 15;
/// Highest cost accepted from an envelope.
const MAX_LOG_N: u8 = 20;

type Salt = [u8; SALT_LEN];

/// The algorithm named in an envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
    Age,
    Leaf,
}

impl Algorithm {
    fn id(self) -> &'static str {
        match self {
            Algorithm::Age => VAULT_CIPHER,
            Algorithm::Leaf => LEAF_CIPHER,
        }
    }
}

/// The full header line written in front of every whole-document envelope.
pub fn vault_header() -> String {
    header(Algorithm::Age)
}

fn header(algorithm: Algorithm) -> String {
    format!("{VAULT_SENTINEL}{VAULT_VERSION};{}", algorithm.id())
}

/// Returns true when `text` (ignoring leading whitespace) is an envelope.
pub fn is_envelope(text: &str) -> bool {
    text.trim_start().starts_with(VAULT_SENTINEL)
}

/// Encrypt `plaintext` with `password` and wrap it in an age envelope.
///
/// The returned text always ends with a newline.
pub fn encrypt(plaintext: &[u8], password: &SecretString) -> Result<String> {
    let encryptor =
        age::Encryptor::with_user_passphrase(password.expose_secret().clone().into());
    let mut encrypted = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .map_err(|e| Error::Encrypt(e.to_string()))?;
    writer.write_all(plaintext)?;
    writer.finish()?;

    Ok(wrap(Algorithm::Age, &encrypted))
}

/// Unwrap an envelope of either kind and decrypt it with `password`.
pub fn decrypt(envelope: &str, password: &SecretString) -> Result<Vec<u8>> {
    match parse_envelope(envelope)? {
        (Algorithm::Age, body) => decrypt_age(&body, password),
        (Algorithm::Leaf, body) => LeafSealer::new(password.clone()).open_body(&body),
    }
}

fn decrypt_age(encrypted: &[u8], password: &SecretString) -> Result<Vec<u8>> {
    let decryptor = match age::Decryptor::new(encrypted).map_err(classify_decrypt_error)? {
        age::Decryptor::Passphrase(d) => d,
        _ => {
            return Err(Error::MalformedCiphertext(
                "expected passphrase-encrypted data".to_string(),
            ));
        }
    };

    let mut decrypted = Vec::new();
    let mut reader = decryptor
        .decrypt(password, None)
        .map_err(classify_decrypt_error)?;
    reader.read_to_end(&mut decrypted).map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidData {
            Error::InvalidCredential
        } else {
            Error::Io(e)
        }
    })?;

    Ok(decrypted)
}

/// Seals and opens leaf envelopes under one password.
///
/// Key derivation is the expensive step, so it runs once per salt: every
/// leaf sealed by one sealer shares a salt and gets its own random nonce,
/// and opening many leaves from one document derives a single key.
pub struct LeafSealer {
    password: SecretString,
    keys: HashMap<Salt, Secret<[u8; KEY_LEN]>>,
    salt: Option<Salt>,
}

impl LeafSealer {
    /// Create a sealer for `password`. Nothing is derived until first use.
    pub fn new(password: SecretString) -> Self {
        Self {
            password,
            keys: HashMap::new(),
            salt: None,
        }
    }

    /// Encrypt one leaf into a `CHACHA20POLY1305` envelope.
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<String> {
        let salt = match self.salt {
            Some(salt) => salt,
            None => {
                let mut salt = [0u8; SALT_LEN];
                rand::thread_rng().fill_bytes(&mut salt);
                self.salt = Some(salt);
                salt
            }
        };
        let cipher = self.cipher(LEAF_LOG_N, salt)?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| Error::Encrypt(e.to_string()))?;

        let mut body = Vec::with_capacity(1 + SALT_LEN + NONCE_LEN + ciphertext.len());
        body.push(LEAF_LOG_N);
        body.extend_from_slice(&salt);
        body.extend_from_slice(&nonce);
        body.extend_from_slice(&ciphertext);
        Ok(wrap(Algorithm::Leaf, &body))
    }

    /// Decrypt an envelope of either kind.
    pub fn open(&mut self, envelope: &str) -> Result<Vec<u8>> {
        match parse_envelope(envelope)? {
            (Algorithm::Age, body) => decrypt_age(&body, &self.password),
            (Algorithm::Leaf, body) => self.open_body(&body),
        }
    }

    fn open_body(&mut self, body: &[u8]) -> Result<Vec<u8>> {
        if body.len() < 1 + SALT_LEN + NONCE_LEN {
            return Err(Error::MalformedCiphertext("leaf envelope too short".to_string()));
        }
        let (&log_n, rest) = body
            .split_first()
            .ok_or_else(|| Error::MalformedCiphertext("empty leaf envelope".to_string()))?;
        let (salt, rest) = rest.split_at(SALT_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        if log_n > MAX_LOG_N {
            return Err(Error::MalformedCiphertext(format!(
                "scrypt cost 2^{log_n} exceeds limit"
            )));
        }

        let mut salt_bytes = [0u8; SALT_LEN];
        salt_bytes.copy_from_slice(salt);
        let cipher = self.cipher(log_n, salt_bytes)?;
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::InvalidCredential)
    }

    fn cipher(&mut self, log_n: u8, salt: Salt) -> Result<ChaCha20Poly1305> {
        if !self.keys.contains_key(&salt) {
            let key = derive_key(&self.password, log_n, &salt)?;
            self.keys.insert(salt, key);
        }
        let key = self
            .keys
            .get(&salt)
            .ok_or_else(|| Error::Encrypt("derived key missing".to_string()))?;
        Ok(ChaCha20Poly1305::new(Key::from_slice(key.expose_secret())))
    }
}

fn derive_key(password: &SecretString, log_n: u8, salt: &Salt) -> Result<Secret<[u8; KEY_LEN]>> {
    let params = scrypt::Params::new(log_n, 8, 1, KEY_LEN)
        .map_err(|e| Error::MalformedCiphertext(format!("invalid scrypt parameters: {e}")))?;
    let mut key = [0u8; KEY_LEN];
    scrypt::scrypt(password.expose_secret().as_bytes(), salt, &params, &mut key)
        .map_err(|e| Error::Encrypt(e.to_string()))?;
    Ok(Secret::new(key))
}

fn wrap(algorithm: Algorithm, bytes: &[u8]) -> String {
    let body = hex::encode(bytes);
    let mut envelope = header(algorithm);
    envelope.push('\n');
    // hex output is ASCII, so byte chunks are valid char boundaries
    for line in body.as_bytes().chunks(LINE_WIDTH) {
        envelope.push_str(&String::from_utf8_lossy(line));
        envelope.push('\n');
    }
    envelope
}

fn parse_envelope(envelope: &str) -> Result<(Algorithm, Vec<u8>)> {
    let mut lines = envelope.trim().lines();
    let header = lines
        .next()
        .ok_or_else(|| Error::MalformedCiphertext("empty envelope".to_string()))?
        .trim();
    let fields = header
        .strip_prefix(VAULT_SENTINEL)
        .ok_or_else(|| Error::MalformedCiphertext("missing vault header".to_string()))?;

    let mut parts = fields.split(';');
    let version = parts.next().unwrap_or_default();
    let cipher = parts.next().unwrap_or_default();
    if version != VAULT_VERSION {
        return Err(Error::MalformedCiphertext(format!(
            "unsupported envelope version '{version}'"
        )));
    }
    let algorithm = match cipher {
        VAULT_CIPHER => Algorithm::Age,
        LEAF_CIPHER => Algorithm::Leaf,
        other => {
            return Err(Error::MalformedCiphertext(format!(
                "unsupported cipher '{other}'"
            )));
        }
    };

    let body: String = lines.flat_map(|l| l.trim().chars()).collect();
    let bytes = hex::decode(body).map_err(|e| Error::MalformedCiphertext(e.to_string()))?;
    Ok((algorithm, bytes))
}

fn classify_decrypt_error(e: age::DecryptError) -> Error {
    match e {
        age::DecryptError::DecryptionFailed
        | age::DecryptError::KeyDecryptionFailed
        | age::DecryptError::NoMatchingKeys
        | age::DecryptError::InvalidMac => Error::InvalidCredential,
        other => Error::MalformedCiphertext(other.to_string()),
    }
}
