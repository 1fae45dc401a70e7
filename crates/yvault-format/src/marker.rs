//! The `!vault` marker on encrypted leaves.
//!
//! An encrypted leaf is stored as a literal block scalar tagged `!vault`:
//!
//! ```text
//! api_key: !vault |
//!   $YVAULT;1.0;CHACHA20POLY1305
//!   0f3a9c...
//! ```
//!
//! The YAML writer knows nothing about that tag, so the codec removes it
//! before parsing ([`strip`]) and puts it back after rendering ([`inject`]).
//! Both passes work line by line on a block scalar header:
//!
//! ```text
//! header    := indent key ':' ws+ [ '!vault' ws+ ] '|' [ chomp ] ws*
//! indent    := ' '*
//! key       := any text up to the last ':' before the indicator
//!              (sequence items such as "- key" included)
//! chomp     := '-' | '+'
//! ```
//!
//! [`inject`] only tags a header whose very next line is indented deeper than
//! the header and starts with the vault sentinel. Every other block scalar is
//! ordinary multi-line text and is left alone. Lines inside a block scalar
//! body are never treated as headers.

use crate::cipher::VAULT_SENTINEL;
use crate::typer;

/// Custom tag marking an encrypted leaf.
pub const VAULT_TAG: &str = "!vault";

/// A parsed block scalar header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockHeader<'a> {
    /// Everything up to and including the key's colon.
    head: &'a str,
    /// Whether the `!vault` tag was present.
    tagged: bool,
    /// `|`, `|-` or `|+`.
    indicator: &'a str,
}

impl BlockHeader<'_> {
    fn render(&self, tagged: bool) -> String {
        if tagged {
            format!("{} {VAULT_TAG} {}", self.head, self.indicator)
        } else {
            format!("{} {}", self.head, self.indicator)
        }
    }
}

fn parse_header(line: &str) -> Option<BlockHeader<'_>> {
    let line = line.trim_end();
    let (before, indicator) = if let Some(b) = line.strip_suffix("|-") {
        (b, &line[line.len() - 2..])
    } else if let Some(b) = line.strip_suffix("|+") {
        (b, &line[line.len() - 2..])
    } else {
        (line.strip_suffix('|')?, &line[line.len() - 1..])
    };

    // the indicator must be separated from what precedes it
    let trimmed = before.trim_end();
    if trimmed.len() == before.len() {
        return None;
    }
    let (trimmed, tagged) = match trimmed.strip_suffix(VAULT_TAG) {
        Some(rest) if rest.ends_with([' ', '\t']) => (rest.trim_end(), true),
        _ => (trimmed, false),
    };

    let head = trimmed.strip_suffix(':').map(|_| trimmed)?;
    let key = head[..head.len() - 1].trim();
    if key.is_empty() || key == "-" {
        return None;
    }
    Some(BlockHeader {
        head,
        tagged,
        indicator,
    })
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Apply `rewrite` to every line outside block scalar bodies, then join
/// the lines back, keeping a trailing newline.
fn rewrite_headers<F>(text: &str, mut rewrite: F) -> String
where
    F: FnMut(&[&str], usize) -> Option<String>,
{
    let source: Vec<&str> = text.lines().collect();
    let mut body_of: Option<usize> = None;
    let lines: Vec<String> = source
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if let Some(column) = body_of {
                if line.trim().is_empty() || indent_of(line) > column {
                    return (*line).to_string();
                }
            }
            body_of = typer::block_column(line);
            rewrite(&source, i).unwrap_or_else(|| (*line).to_string())
        })
        .collect();

    let mut out = lines.join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Rewrite every `key: !vault |` header to `key: |`.
pub fn strip(text: &str) -> String {
    rewrite_headers(text, |source, i| match parse_header(source[i]) {
        Some(header) if header.tagged => Some(header.render(false)),
        _ => None,
    })
}

/// Rewrite `key: |` headers that introduce ciphertext to `key: !vault |`.
pub fn inject(text: &str) -> String {
    rewrite_headers(text, |source, i| {
        let line = source[i];
        let header = parse_header(line).filter(|h| !h.tagged)?;
        let carries_ciphertext = source.get(i + 1).is_some_and(|next| {
            indent_of(next) > indent_of(line) && next.trim_start().starts_with(VAULT_SENTINEL)
        });
        carries_ciphertext.then(|| header.render(true))
    })
}
