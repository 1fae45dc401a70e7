//! Loading and dumping documents in any [`Encoding`].

use crate::cipher::{self, LeafSealer};
use crate::detect::{classify, Encoding};
use crate::document::{Document, Value};
use crate::error::{Error, Result};
use crate::{marker, typer};
use log::debug;
use secrecy::SecretString;
use std::fmt;
use std::str::FromStr;

/// Source of the document password.
///
/// The codec asks at most once per `load`/`dump` call, and only when it
/// actually meets ciphertext or has to produce it.
pub trait PasswordProvider {
    /// Return the password for the current document.
    fn password(&mut self) -> Result<SecretString>;
}

impl PasswordProvider for SecretString {
    fn password(&mut self) -> Result<SecretString> {
        Ok(self.clone())
    }
}

impl<F> PasswordProvider for F
where
    F: FnMut() -> Result<SecretString>,
{
    fn password(&mut self) -> Result<SecretString> {
        self()
    }
}

/// A provider for documents that must not need a password.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPassword;

impl PasswordProvider for NoPassword {
    fn password(&mut self) -> Result<SecretString> {
        Err(Error::Prompt("no password available".to_string()))
    }
}

/// Caches the first password handed out by the wrapped provider.
struct OncePassword<'a> {
    inner: &'a mut dyn PasswordProvider,
    cached: Option<SecretString>,
}

impl<'a> OncePassword<'a> {
    fn new(inner: &'a mut dyn PasswordProvider) -> Self {
        Self {
            inner,
            cached: None,
        }
    }

    fn get(&mut self) -> Result<&SecretString> {
        let password = match self.cached.take() {
            Some(password) => password,
            None => self.inner.password()?,
        };
        Ok(self.cached.insert(password))
    }
}

/// Leaf cipher for one `load`/`dump` call, created on first use so a
/// document without ciphertext never asks for a password.
struct Leaves<'a, 'p> {
    passwords: &'a mut OncePassword<'p>,
    sealer: Option<LeafSealer>,
}

impl<'a, 'p> Leaves<'a, 'p> {
    fn new(passwords: &'a mut OncePassword<'p>) -> Self {
        Self {
            passwords,
            sealer: None,
        }
    }

    fn sealer(&mut self) -> Result<&mut LeafSealer> {
        let sealer = match self.sealer.take() {
            Some(sealer) => sealer,
            None => LeafSealer::new(self.passwords.get()?.clone()),
        };
        Ok(self.sealer.insert(sealer))
    }
}

/// Text format for rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// YAML, with `!vault` markers in mixed output.
    #[default]
    Yaml,
    /// Pretty-printed JSON.
    Json,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Yaml => f.write_str("yaml"),
            Format::Json => f.write_str("json"),
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "yaml" | "yml" => Ok(Format::Yaml),
            "json" => Ok(Format::Json),
            other => Err(format!("unknown format '{other}'")),
        }
    }
}

/// Load `raw` as a document stored in `encoding`.
///
/// Ciphertext is decrypted on the way in, so the returned document never
/// holds an envelope. A decryption failure fails the whole load.
pub fn load(
    raw: &[u8],
    encoding: Encoding,
    passwords: &mut dyn PasswordProvider,
) -> Result<Document> {
    let text = std::str::from_utf8(raw)?;
    let mut passwords = OncePassword::new(passwords);
    debug!("loading {} document ({} bytes)", encoding, raw.len());

    match encoding {
        Encoding::Plain => parse_hand_written(text),
        Encoding::Full => {
            if !cipher::is_envelope(text) {
                return Err(Error::NotEncrypted);
            }
            let plaintext = cipher::decrypt(text, passwords.get()?)?;
            let doc = parse_yaml(std::str::from_utf8(&plaintext)?)?;
            if doc.is_empty() {
                return Err(Error::EmptyResult);
            }
            Ok(doc)
        }
        Encoding::Mixed => {
            let mut doc = parse_hand_written(text)?;
            let decrypted = decrypt_document(&mut doc, &mut Leaves::new(&mut passwords))?;
            debug!("decrypted {decrypted} vault leaves");
            Ok(doc)
        }
    }
}

/// Detect the encoding of `raw` and load it.
///
/// The detected encoding is tried first. Only when it yields nothing
/// ([`Error::EmptyResult`]) are the other encodings tried; if none produces
/// a document the result is [`Error::UnrecognizedFormat`]. Any other error
/// from the detected encoding, a wrong password in particular, is returned
/// as is.
pub fn probe(raw: &[u8], passwords: &mut dyn PasswordProvider) -> Result<(Document, Encoding)> {
    let detected = classify(raw);
    debug!("detected {detected} encoding");
    match load(raw, detected, passwords) {
        Ok(doc) => return Ok((doc, detected)),
        Err(e) if e.is_empty_result() => {}
        Err(e) => return Err(e),
    }

    for encoding in Encoding::ALL.into_iter().filter(|e| *e != detected) {
        match load(raw, encoding, passwords) {
            Ok(doc) if !doc.is_empty() => {
                debug!("fell back to {encoding} encoding");
                return Ok((doc, encoding));
            }
            Err(Error::InvalidCredential) => return Err(Error::InvalidCredential),
            Ok(_) => {}
            Err(e) => debug!("{encoding} decode failed: {e}"),
        }
    }
    Err(Error::UnrecognizedFormat)
}

/// Render `doc` in `encoding` as YAML.
pub fn dump(
    doc: &Document,
    encoding: Encoding,
    passwords: &mut dyn PasswordProvider,
) -> Result<Vec<u8>> {
    dump_as(doc, encoding, Format::Yaml, passwords)
}

/// Render `doc` in `encoding` using the given text format.
///
/// `Full` output is an opaque envelope and only exists as YAML-inside-
/// ciphertext; asking for it as JSON is an error.
pub fn dump_as(
    doc: &Document,
    encoding: Encoding,
    format: Format,
    passwords: &mut dyn PasswordProvider,
) -> Result<Vec<u8>> {
    let mut passwords = OncePassword::new(passwords);
    debug!(
        "dumping {} leaves as {encoding}/{format}",
        doc.leaf_count()
    );

    let rendered = match (encoding, format) {
        (Encoding::Plain, format) => render(doc, format)?,
        (Encoding::Full, Format::Yaml) => {
            let plain = render(doc, Format::Yaml)?;
            cipher::encrypt(plain.as_bytes(), passwords.get()?)?
        }
        (Encoding::Full, Format::Json) => {
            return Err(Error::Unsupported(
                "a fully encrypted vault has no json form".to_string(),
            ));
        }
        (Encoding::Mixed, format) => {
            let encrypted = encrypt_document(doc, &mut Leaves::new(&mut passwords))?;
            let text = render(&encrypted, format)?;
            match format {
                Format::Yaml => marker::inject(&text),
                Format::Json => text,
            }
        }
    };
    Ok(rendered.into_bytes())
}

/// Parse a hand-editable (plain or mixed) document.
fn parse_hand_written(text: &str) -> Result<Document> {
    let normalized = typer::preprocess(&marker::strip(text));
    parse_yaml(&normalized)
}

fn parse_yaml(text: &str) -> Result<Document> {
    if text.trim().is_empty() {
        return Ok(Document::new());
    }
    let value: serde_yaml::Value = serde_yaml::from_str(text)?;
    Document::from_yaml(value)
}

fn render(doc: &Document, format: Format) -> Result<String> {
    Ok(match format {
        Format::Yaml => serde_yaml::to_string(doc)?,
        Format::Json => {
            let mut json = serde_json::to_string_pretty(doc)?;
            json.push('\n');
            json
        }
    })
}

fn decrypt_document(doc: &mut Document, leaves: &mut Leaves<'_, '_>) -> Result<usize> {
    let mut count = 0;
    for (_, value) in doc.iter_mut() {
        count += decrypt_value(value, leaves)?;
    }
    Ok(count)
}

fn decrypt_value(value: &mut Value, leaves: &mut Leaves<'_, '_>) -> Result<usize> {
    match value {
        Value::String(text) if cipher::is_envelope(text) => {
            let plaintext = leaves.sealer()?.open(text)?;
            let leaf: serde_yaml::Value = serde_yaml::from_str(std::str::from_utf8(&plaintext)?)?;
            *value = Value::from_yaml(leaf)?;
            Ok(1)
        }
        Value::Sequence(items) => {
            let mut count = 0;
            for item in items {
                count += decrypt_value(item, leaves)?;
            }
            Ok(count)
        }
        Value::Mapping(doc) => decrypt_document(doc, leaves),
        _ => Ok(0),
    }
}

fn encrypt_document(doc: &Document, leaves: &mut Leaves<'_, '_>) -> Result<Document> {
    let mut encrypted = Document::new();
    for (key, value) in doc.iter() {
        let sealed = match value {
            Value::Mapping(inner) => Value::Mapping(encrypt_document(inner, leaves)?),
            leaf => {
                let plaintext = serde_yaml::to_string(leaf)?;
                Value::String(leaves.sealer()?.seal(plaintext.as_bytes())?)
            }
        };
        encrypted.insert(key, sealed);
    }
    Ok(encrypted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn password(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[test]
    fn plain_load_types_unquoted_scalars() {
        let raw = b"db: s3cr3t\npin: 0042\nport: 5432\ntls: true\n";
        let doc = load(raw, Encoding::Plain, &mut NoPassword).unwrap();
        assert_eq!(doc.get("db"), Some(&Value::from("s3cr3t")));
        assert_eq!(doc.get("pin"), Some(&Value::from("0042")));
        assert_eq!(doc.get("port"), Some(&Value::from(5432_i64)));
        assert_eq!(doc.get("tls"), Some(&Value::from(true)));
    }

    #[test]
    fn plain_load_joins_continued_plain_scalars() {
        let raw = b"motd: hello\n  world\nname: x\n";
        let doc = load(raw, Encoding::Plain, &mut NoPassword).unwrap();
        assert_eq!(doc.get("motd"), Some(&Value::from("hello world")));
        assert_eq!(doc.get("name"), Some(&Value::from("x")));
    }

    #[test]
    fn plain_load_keeps_quoted_scalars_spanning_lines() {
        let raw = b"msg: \"hello\n  world: foo\"\n";
        let doc = load(raw, Encoding::Plain, &mut NoPassword).unwrap();
        assert_eq!(doc.get("msg"), Some(&Value::from("hello world: foo")));

        let raw = b"msg: 'it''s\n  0042'\npin: 0042\n";
        let doc = load(raw, Encoding::Plain, &mut NoPassword).unwrap();
        assert_eq!(doc.get("msg"), Some(&Value::from("it's 0042")));
        assert_eq!(doc.get("pin"), Some(&Value::from("0042")));
    }

    #[test]
    fn empty_plain_is_empty_document() {
        let doc = load(b"  \n", Encoding::Plain, &mut NoPassword).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn plain_dump_uses_block_scalars_for_multiline() {
        let doc: Document = [
            ("cert", Value::from("line one\nline two\n")),
            ("name", Value::from("x")),
        ]
        .into_iter()
        .collect();
        let text = String::from_utf8(dump(&doc, Encoding::Plain, &mut NoPassword).unwrap()).unwrap();
        assert_eq!(text, "cert: |\n  line one\n  line two\nname: x\n");
    }

    #[test]
    fn plain_dump_needs_no_password() {
        let doc: Document = [("a", Value::from(1_i64))].into_iter().collect();
        assert!(dump(&doc, Encoding::Plain, &mut NoPassword).is_ok());
    }

    #[test]
    fn full_load_rejects_plain_text() {
        let err = load(b"a: 1\n", Encoding::Full, &mut password("pw")).unwrap_err();
        assert!(matches!(err, Error::NotEncrypted));
    }

    #[test]
    fn full_json_is_unsupported() {
        let doc: Document = [("a", Value::from(1_i64))].into_iter().collect();
        let err = dump_as(&doc, Encoding::Full, Format::Json, &mut password("pw")).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn password_is_requested_once_per_call() {
        let doc: Document = [
            ("a", Value::from("1")),
            ("b", Value::from("2")),
            ("c", Value::from("3")),
        ]
        .into_iter()
        .collect();
        let mut calls = 0;
        let mut provider = || -> Result<SecretString> {
            calls += 1;
            Ok(password("pw"))
        };
        dump(&doc, Encoding::Mixed, &mut provider).unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn mixed_json_has_no_tags() {
        let doc: Document = [("k", Value::from("v"))].into_iter().collect();
        let out = dump_as(&doc, Encoding::Mixed, Format::Json, &mut password("pw")).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(json["k"]
            .as_str()
            .unwrap()
            .starts_with("$YVAULT;1.0;CHACHA20POLY1305\n"));
        assert!(!String::from_utf8(out).unwrap().contains("!vault"));
    }

    #[test]
    fn empty_mixed_document_round_trips() {
        let doc = Document::new();
        let raw = dump(&doc, Encoding::Mixed, &mut NoPassword).unwrap();
        assert_eq!(raw, b"{}\n");
        let loaded = load(&raw, Encoding::Mixed, &mut NoPassword).unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn mixed_leaves_use_leaf_envelopes() {
        let doc: Document = (0..4)
            .map(|i| (format!("k{i}"), Value::from(format!("v{i}"))))
            .collect();
        let raw = dump(&doc, Encoding::Mixed, &mut password("pw")).unwrap();
        let text = String::from_utf8(raw.clone()).unwrap();
        assert_eq!(text.matches("$YVAULT;1.0;CHACHA20POLY1305").count(), 4);

        let mut calls = 0;
        let mut provider = || -> Result<SecretString> {
            calls += 1;
            Ok(password("pw"))
        };
        assert_eq!(load(&raw, Encoding::Mixed, &mut provider).unwrap(), doc);
        assert_eq!(calls, 1);
    }

    #[test]
    fn probe_reports_unrecognized_format() {
        // an empty document sealed as a full vault decodes to nothing
        let envelope = cipher::encrypt(b"{}\n", &password("pw")).unwrap();
        let err = probe(envelope.as_bytes(), &mut password("pw")).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedFormat));
    }

    #[test]
    fn format_parses_cli_names() {
        assert_eq!("yaml".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert!("toml".parse::<Format>().is_err());
    }
}
