//! yvault: view, edit and re-encrypt password-protected YAML documents.
//!
//! # Usage
//!
//! ```bash
//! # Print a document in clear
//! yvault secrets.yml
//!
//! # Encrypt every value in place, leaving keys readable
//! yvault secrets.yml -m mixed -i
//!
//! # Edit, then write back in the encoding the file was stored in
//! yvault secrets.yml -e
//! ```

use clap::Parser;
use env_logger::Env;
use log::error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use yvault_format::{Encoding, Format};
use yvault_session::{run, CommandEditor, Options, Outcome, TerminalPrompt};

/// View, edit and re-encrypt password-protected YAML documents.
///
/// The current password is read from the terminal, or from
/// YVAULT_PASSWORD when set.
#[derive(Parser, Debug)]
#[command(name = "yvault")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Document to read
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Output encoding: clear, mixed or vault
    #[arg(short, long, value_name = "MODE")]
    mode: Option<Encoding>,

    /// Output format for clear and mixed: yaml or json
    #[arg(short, long, value_name = "FORMAT")]
    format: Option<Format>,

    /// Open the document in $VISUAL / $EDITOR, then write it back
    #[arg(short, long)]
    edit: bool,

    /// Write the result back over FILE
    #[arg(short, long)]
    in_place: bool,

    /// Change the document password
    #[arg(short, long)]
    rotate: bool,

    /// Write the result to OUTPUT instead of stdout
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Set KEY.PATH to VALUE, then write back
    #[arg(short = 'u', long = "set", num_args = 2, value_names = ["KEY.PATH", "VALUE"])]
    set: Option<Vec<String>>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_options(self) -> Options {
        let set = self.set.and_then(|pair| match <[String; 2]>::try_from(pair) {
            Ok([key, value]) => Some((key, value)),
            Err(_) => None,
        });
        Options {
            file: self.file,
            mode: self.mode,
            format: self.format,
            edit: self.edit,
            in_place: self.in_place,
            rotate: self.rotate,
            output: self.output,
            set,
        }
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for the document
    let log_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .target(env_logger::Target::Stderr)
        .init();

    let options = args.into_options();
    let mut editor = match CommandEditor::from_env() {
        Ok(editor) => editor,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    match run(&options, TerminalPrompt, &mut editor) {
        Ok(Outcome::Emitted(bytes)) => {
            let mut stdout = io::stdout().lock();
            if let Err(e) = stdout.write_all(&bytes).and_then(|_| stdout.flush()) {
                error!("Failed to write output: {}", e);
                process::exit(1);
            }
        }
        Ok(Outcome::Written(_)) => {}
        Err(e) if e.is_usage() => {
            error!("{}", e);
            process::exit(2);
        }
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
