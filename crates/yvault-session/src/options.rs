//! What a session run was asked to do.

use crate::error::{Error, Result};
use std::path::PathBuf;
use yvault_format::{Encoding, Format};

/// Requested actions for one run over one file.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Document to read.
    pub file: PathBuf,
    /// Target encoding, if given explicitly.
    pub mode: Option<Encoding>,
    /// Output text format, if given explicitly.
    pub format: Option<Format>,
    /// Open the document in an editor.
    pub edit: bool,
    /// Write the result back over `file`.
    pub in_place: bool,
    /// Change the document password.
    pub rotate: bool,
    /// Write the result to this file instead of stdout.
    pub output: Option<PathBuf>,
    /// Assign `VALUE` at a dotted `KEY.PATH`.
    pub set: Option<(String, String)>,
}

impl Options {
    /// Options for reading `file` and printing it in clear.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    /// Whether some action modifies the document, which implies writing it
    /// back where it came from.
    pub fn modifies(&self) -> bool {
        self.edit || self.rotate || self.set.is_some()
    }

    /// Whether the result goes back to `file`.
    pub fn writes_in_place(&self) -> bool {
        self.in_place || self.modifies()
    }

    /// Reject option combinations that cannot be honoured.
    ///
    /// Runs before the file is touched.
    pub fn validate(&self) -> Result<()> {
        let conflict = |first, second| Err(Error::IncompatibleOptions { first, second });

        if self.in_place && self.format.is_some() {
            return conflict("--in-place", "--format");
        }
        if self.mode == Some(Encoding::Full) && self.format.is_some() {
            return conflict("--mode vault", "--format");
        }
        if self.in_place && self.edit {
            return conflict("--in-place", "--edit");
        }
        if self.in_place && self.output.is_some() {
            return conflict("--in-place", "--output");
        }
        if let Some(action) = self.modifying_flag() {
            if self.output.is_some() {
                return conflict("--output", action);
            }
            if self.format.is_some() {
                return conflict("--format", action);
            }
        }
        Ok(())
    }

    /// Encoding to write, given the encoding the file was read in.
    pub fn target(&self, source: Encoding) -> Encoding {
        match self.mode {
            Some(mode) => mode,
            None if self.writes_in_place() => source,
            None => Encoding::Plain,
        }
    }

    fn modifying_flag(&self) -> Option<&'static str> {
        if self.edit {
            Some("--edit")
        } else if self.rotate {
            Some("--rotate")
        } else if self.set.is_some() {
            Some("--set")
        } else {
            None
        }
    }
}
