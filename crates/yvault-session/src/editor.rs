//! External editor invocation.

use crate::error::{Error, Result};
use log::{debug, warn};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tempfile::NamedTempFile;

/// Editor used when neither `VISUAL` nor `EDITOR` is set.
pub const DEFAULT_EDITOR: &str = "vi";

/// Something that lets the user change a file in place.
pub trait Editor {
    /// Edit the file at `path`, returning once the user is done.
    fn edit(&mut self, path: &Path) -> Result<()>;
}

impl<F> Editor for F
where
    F: FnMut(&Path) -> Result<()>,
{
    fn edit(&mut self, path: &Path) -> Result<()> {
        self(path)
    }
}

/// Runs an editor command with the file path appended as its last argument.
#[derive(Debug, Clone)]
pub struct CommandEditor {
    program: String,
    args: Vec<String>,
}

impl CommandEditor {
    /// Build from a command line such as `code --wait`.
    pub fn new(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::Editor("empty editor command".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Use `$VISUAL`, then `$EDITOR`, then [`DEFAULT_EDITOR`].
    pub fn from_env() -> Result<Self> {
        let command = ["VISUAL", "EDITOR"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EDITOR.to_string());
        Self::new(&command)
    }

    /// The program that will be run.
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Editor for CommandEditor {
    fn edit(&mut self, path: &Path) -> Result<()> {
        debug!("launching editor: {}", self.program);
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .status()
            .map_err(|e| Error::Editor(format!("failed to run '{}': {}", self.program, e)))?;

        // whatever is on disk when the editor exits is trusted
        if !status.success() {
            warn!("editor '{}' exited with {}", self.program, status);
        }
        Ok(())
    }
}

/// A private temporary file holding decrypted content while it is edited.
///
/// The file is truncated and removed when dropped, on every exit path.
#[derive(Debug)]
pub struct ScratchFile {
    file: NamedTempFile,
}

impl ScratchFile {
    /// Create the file and fill it with `contents`.
    pub fn create(contents: &[u8]) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("yvault-")
            .suffix(".yml")
            .tempfile()?;
        file.write_all(contents)?;
        file.flush()?;
        Ok(Self { file })
    }

    /// Path handed to the editor.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read back the current contents by path; editors often replace the
    /// file rather than writing into it.
    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(fs::read(self.path())?)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        // the file itself is removed by NamedTempFile's own drop
        if let Err(e) = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.file.path())
        {
            debug!("could not truncate scratch file: {e}");
        }
    }
}
