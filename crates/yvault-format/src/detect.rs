use crate::cipher::VAULT_SENTINEL;
use std::fmt;
use std::str::FromStr;

/// On-disk representation of a vault document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// No ciphertext anywhere.
    Plain,
    /// A YAML document whose leaves are individually encrypted.
    Mixed,
    /// The whole byte stream is a single ciphertext envelope.
    Full,
}

impl Encoding {
    /// All encodings, in probing order.
    pub const ALL: [Encoding; 3] = [Encoding::Full, Encoding::Mixed, Encoding::Plain];

    /// Whether loading or dumping this encoding needs a password.
    pub fn is_encrypted(self) -> bool {
        !matches!(self, Encoding::Plain)
    }

    /// Name used on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Plain => "clear",
            Encoding::Mixed => "mixed",
            Encoding::Full => "vault",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clear" | "plain" => Ok(Encoding::Plain),
            "mixed" => Ok(Encoding::Mixed),
            "vault" | "full" => Ok(Encoding::Full),
            other => Err(format!("unknown encoding '{other}'")),
        }
    }
}

/// Classify raw document bytes by scanning for the vault sentinel.
///
/// This never parses the input: a `Full` body is not YAML until decrypted.
pub fn classify(raw: &[u8]) -> Encoding {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.starts_with(VAULT_SENTINEL) {
        Encoding::Full
    } else if trimmed.contains(VAULT_SENTINEL) {
        Encoding::Mixed
    } else {
        Encoding::Plain
    }
}
