//! Password acquisition via TTY prompt or the `YVAULT_PASSWORD` environment variable.

use crate::error::{Error, Result};
use std::collections::VecDeque;
use yvault_format::SecretString;

/// The environment variable name for providing the current document password.
pub const PASSWORD_ENV_VAR: &str = "YVAULT_PASSWORD";

/// Which password is being asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordKind {
    /// The password the document is (or will be) encrypted with.
    Current,
    /// A replacement password during rotation.
    New,
    /// Confirmation of the replacement password.
    Confirm,
}

impl PasswordKind {
    /// Prompt text shown to the user.
    pub fn label(self) -> &'static str {
        match self {
            PasswordKind::Current => "Vault password",
            PasswordKind::New => "New vault password",
            PasswordKind::Confirm => "Confirm new vault password",
        }
    }
}

/// Source of passwords for a session.
pub trait PasswordPrompt {
    /// Ask for one password.
    fn prompt(&mut self, kind: PasswordKind) -> Result<SecretString>;
}

/// Reads passwords from the terminal with echo disabled.
///
/// The current password may instead come from `YVAULT_PASSWORD` for
/// headless use. New passwords are always read interactively.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn prompt(&mut self, kind: PasswordKind) -> Result<SecretString> {
        if kind == PasswordKind::Current {
            if let Ok(password) = std::env::var(PASSWORD_ENV_VAR) {
                if !password.is_empty() {
                    return Ok(SecretString::new(password));
                }
            }
        }

        let password = rpassword::prompt_password(format!("{}: ", kind.label()))?;
        if password.is_empty() {
            return Err(Error::EmptyPassword);
        }
        Ok(SecretString::new(password))
    }
}

/// Answers prompts from a fixed list, in order. Records what was asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    asked: Vec<PasswordKind>,
}

impl ScriptedPrompt {
    /// Create a prompt that returns `answers` one by one.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    /// The prompts issued so far.
    pub fn asked(&self) -> &[PasswordKind] {
        &self.asked
    }
}

impl PasswordPrompt for ScriptedPrompt {
    fn prompt(&mut self, kind: PasswordKind) -> Result<SecretString> {
        self.asked.push(kind);
        match self.answers.pop_front() {
            Some(answer) if answer.is_empty() => Err(Error::EmptyPassword),
            Some(answer) => Ok(SecretString::new(answer)),
            None => Err(Error::Format(yvault_format::Error::Prompt(format!(
                "no scripted answer for '{}'",
                kind.label()
            )))),
        }
    }
}
