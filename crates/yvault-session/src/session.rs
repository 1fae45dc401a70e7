use crate::editor::{Editor, ScratchFile};
use crate::error::{Error, Result};
use crate::options::Options;
use crate::prompt::{PasswordKind, PasswordPrompt};
use crate::writeback;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use yvault_format::codec::{self, PasswordProvider};
use yvault_format::typer;
use yvault_format::{Document, Encoding, ExposeSecret, Format, NoPassword, SecretString, Value};

/// An open document and the password that unlocks it.
///
/// The password is asked for at most once, the first time ciphertext is
/// met or has to be produced, and is reused for the rest of the session.
#[derive(Debug)]
pub struct Session<P> {
    path: PathBuf,
    document: Document,
    source: Encoding,
    password: Option<SecretString>,
    prompt: P,
}

/// Where the rendered document went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Written to this file.
    Written(PathBuf),
    /// Returned for printing.
    Emitted(Vec<u8>),
}

impl<P: PasswordPrompt> Session<P> {
    /// Read `path`, detect its encoding and decode it.
    pub fn open(path: impl Into<PathBuf>, mut prompt: P) -> Result<Self> {
        let path = path.into();
        let raw = fs::read(&path)?;
        let mut password = None;

        let (document, source) = {
            let mut provider = SessionPassword::new(&mut prompt, &mut password);
            let result = codec::probe(&raw, &mut provider);
            provider.finish(result)?
        };
        info!(
            "opened {} ({} encoding, {} keys)",
            path.display(),
            source,
            document.len()
        );

        Ok(Self {
            path,
            document,
            source,
            password,
            prompt,
        })
    }

    /// The file this session was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The encoding the file was stored in.
    pub fn source(&self) -> Encoding {
        self.source
    }

    /// The decoded document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The prompt, for inspection after a run.
    pub fn prompt(&self) -> &P {
        &self.prompt
    }

    /// Replace the password the document will be written with.
    ///
    /// The new password is asked for twice. Nothing changes unless both
    /// answers agree and differ from the current password.
    pub fn rotate_password(&mut self) -> Result<()> {
        if !self.source.is_encrypted() {
            return Err(Error::NothingToRotate);
        }
        let current = self.current_password()?;
        let new = self.prompt.prompt(PasswordKind::New)?;
        let confirm = self.prompt.prompt(PasswordKind::Confirm)?;

        if new.expose_secret() != confirm.expose_secret() {
            return Err(Error::PasswordMismatch);
        }
        if new.expose_secret() == current.expose_secret() {
            return Err(Error::NoChange);
        }

        self.password = Some(new);
        info!("password rotated for {}", self.path.display());
        Ok(())
    }

    /// Let the user change the document in `editor`.
    ///
    /// The document is handed over in clear through a private scratch file
    /// which is wiped and removed afterwards, whether or not editing worked.
    pub fn edit(&mut self, editor: &mut dyn Editor) -> Result<()> {
        let clear = codec::dump(&self.document, Encoding::Plain, &mut NoPassword)?;
        let scratch = ScratchFile::create(&clear)?;
        debug!("editing through {}", scratch.path().display());

        editor.edit(scratch.path())?;
        let edited = scratch.read()?;
        self.document = codec::load(&edited, Encoding::Plain, &mut NoPassword)?;
        info!("edited document has {} keys", self.document.len());
        Ok(())
    }

    /// Assign `raw` at the dotted `key_path`, typing it the way an
    /// unquoted value in the file would be typed.
    ///
    /// Returns the value that was replaced, if any.
    pub fn set(&mut self, key_path: &str, raw: &str) -> Result<Option<Value>> {
        let segments: Vec<&str> = key_path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidKeyPath(key_path.to_string()));
        }
        let value = typed_value(raw);
        debug!("setting {key_path}");
        Ok(self.document.set_path(&segments, value)?)
    }

    /// Render the document in `target` encoding.
    pub fn render(&mut self, target: Encoding, format: Format) -> Result<Vec<u8>> {
        let mut provider = SessionPassword::new(&mut self.prompt, &mut self.password);
        let result = codec::dump_as(&self.document, target, format, &mut provider);
        provider.finish(result)
    }

    /// Render in `target` encoding and write back over the source file.
    pub fn save(&mut self, target: Encoding) -> Result<()> {
        let bytes = self.render(target, Format::Yaml)?;
        writeback::write_atomic(&self.path, &bytes)
    }

    fn current_password(&mut self) -> Result<SecretString> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        let password = self.prompt.prompt(PasswordKind::Current)?;
        self.password = Some(password.clone());
        Ok(password)
    }
}

/// Carry out everything `options` asks for on one file.
///
/// Options are checked before the file is read. Nothing is written unless
/// every step succeeded.
pub fn run<P: PasswordPrompt>(
    options: &Options,
    prompt: P,
    editor: &mut dyn Editor,
) -> Result<Outcome> {
    options.validate()?;

    let mut session = Session::open(&options.file, prompt)?;
    if options.rotate {
        session.rotate_password()?;
    }
    if options.edit {
        session.edit(editor)?;
    }
    if let Some((key_path, value)) = &options.set {
        session.set(key_path, value)?;
    }

    let target = options.target(session.source());
    let format = options.format.unwrap_or_default();
    debug!("re-encoding {} -> {target}", session.source());
    let bytes = session.render(target, format)?;

    if options.writes_in_place() {
        writeback::write_atomic(session.path(), &bytes)?;
        Ok(Outcome::Written(session.path().to_path_buf()))
    } else if let Some(output) = &options.output {
        writeback::write_atomic(output, &bytes)?;
        Ok(Outcome::Written(output.clone()))
    } else {
        Ok(Outcome::Emitted(bytes))
    }
}

fn typed_value(raw: &str) -> Value {
    let normalized = typer::normalize(raw);
    let rendered = normalized.render();
    Value::parse_yaml(&rendered).unwrap_or_else(|_| Value::from(raw))
}

/// Hands the codec the session password, prompting once if there is none.
///
/// The codec only sees its own error type, so a prompt failure is kept
/// aside and surfaced by [`SessionPassword::finish`].
struct SessionPassword<'a, P> {
    prompt: &'a mut P,
    password: &'a mut Option<SecretString>,
    failure: Option<Error>,
}

impl<'a, P: PasswordPrompt> SessionPassword<'a, P> {
    fn new(prompt: &'a mut P, password: &'a mut Option<SecretString>) -> Self {
        Self {
            prompt,
            password,
            failure: None,
        }
    }

    fn finish<T>(self, result: yvault_format::Result<T>) -> Result<T> {
        match (result, self.failure) {
            (Err(_), Some(failure)) => Err(failure),
            (result, _) => Ok(result?),
        }
    }
}

impl<P: PasswordPrompt> PasswordProvider for SessionPassword<'_, P> {
    fn password(&mut self) -> yvault_format::Result<SecretString> {
        if let Some(password) = self.password.as_ref() {
            return Ok(password.clone());
        }
        match self.prompt.prompt(PasswordKind::Current) {
            Ok(password) => {
                *self.password = Some(password.clone());
                Ok(password)
            }
            Err(e) => {
                let message = e.to_string();
                self.failure = Some(e);
                Err(yvault_format::Error::Prompt(message))
            }
        }
    }
}
