//! Scalar typing for hand-edited YAML.
//!
//! Secret values are routinely written unquoted (`password: 0123:abc`,
//! `token: @xyz`), which either trips the YAML parser or silently changes
//! their type. [`preprocess`] rewrites every unquoted scalar value into an
//! explicit form before the document reaches the parser: booleans, nulls
//! and decimal numbers stay bare, everything else becomes a single-quoted
//! string.

use std::borrow::Cow;

/// A scalar after normalization, ready to be written back into YAML text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedScalar<'a> {
    /// Left for the YAML parser to interpret (block/flow indicators, tags,
    /// quoted strings, anchors, empty values).
    Passthrough(&'a str),
    /// A boolean token.
    Bool(bool),
    /// A null token.
    Null,
    /// A decimal number literal, kept verbatim.
    Number(&'a str),
    /// Anything else, as a string.
    Str(&'a str),
}

impl TypedScalar<'_> {
    /// Render the scalar as YAML source text.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            TypedScalar::Passthrough(raw) | TypedScalar::Number(raw) => Cow::Borrowed(*raw),
            TypedScalar::Bool(true) => Cow::Borrowed("true"),
            TypedScalar::Bool(false) => Cow::Borrowed("false"),
            TypedScalar::Null => Cow::Borrowed("null"),
            TypedScalar::Str(s) => Cow::Owned(format!("'{}'", s.replace('\'', "''"))),
        }
    }
}

/// Classify a single raw scalar (already trimmed of surrounding whitespace).
pub fn normalize(raw: &str) -> TypedScalar<'_> {
    let raw = raw.trim();
    match raw.chars().next() {
        None => return TypedScalar::Passthrough(raw),
        Some('|' | '>' | '-' | '!' | '\'' | '"' | '{' | '[' | '&' | '*') => {
            return TypedScalar::Passthrough(raw);
        }
        _ => {}
    }

    let value = strip_comment(raw);
    match value {
        "" => TypedScalar::Passthrough(value),
        "true" | "True" | "TRUE" => TypedScalar::Bool(true),
        "false" | "False" | "FALSE" => TypedScalar::Bool(false),
        "~" | "null" | "Null" | "NULL" => TypedScalar::Null,
        v if is_decimal(v) => TypedScalar::Number(v),
        v => TypedScalar::Str(v),
    }
}

/// Drop a trailing ` # comment` from an unquoted scalar.
fn strip_comment(raw: &str) -> &str {
    if raw.starts_with('#') {
        return "";
    }
    let bytes = raw.as_bytes();
    for (i, b) in bytes.iter().enumerate().skip(1) {
        if *b == b'#' && bytes[i - 1].is_ascii_whitespace() {
            return raw[..i].trim_end();
        }
    }
    raw
}

/// Decimal literal: optional sign, integer part without leading zeros,
/// optional fraction, optional exponent.
fn is_decimal(s: &str) -> bool {
    let unsigned = s.strip_prefix(&['+', '-'][..]).unwrap_or(s);
    let (mantissa, exponent) = match unsigned.find(&['e', 'E'][..]) {
        Some(i) => (&unsigned[..i], Some(&unsigned[i + 1..])),
        None => (unsigned, None),
    };
    let (int, frac) = match mantissa.split_once('.') {
        Some((int, frac)) => (int, frac),
        None => (mantissa, ""),
    };
    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());

    if int.is_empty() && frac.is_empty() {
        return false;
    }
    if !all_digits(int) || !all_digits(frac) {
        return false;
    }
    if int.len() > 1 && int.starts_with('0') {
        return false;
    }
    match exponent {
        Some(exp) => {
            let exp = exp.strip_prefix(&['+', '-'][..]).unwrap_or(exp);
            !exp.is_empty() && all_digits(exp)
        }
        None => true,
    }
}

/// Whether a value opens a block scalar, optionally behind a tag
/// (`|`, `>-`, `!vault |`).
pub(crate) fn opens_block(value: &str) -> bool {
    let value = value.trim_start();
    let value = match value.strip_prefix('!') {
        Some(tagged) => match tagged.find(char::is_whitespace) {
            Some(i) => tagged[i..].trim_start(),
            None => return false,
        },
        None => value,
    };
    value.starts_with('|') || value.starts_with('>')
}

/// Normalize every scalar value in a YAML document's text.
///
/// Handles `key: value` lines and `- value` sequence items at any depth.
/// A plain scalar continued on more-indented lines is joined before it is
/// typed. Block scalar bodies, quoted scalars spanning lines, multi-line
/// flow collections, comments, directives and document markers are copied
/// through untouched.
pub fn preprocess(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut push = |line: &str| {
        out.push_str(line);
        out.push('\n');
    };

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        i += 1;
        match classify_line(line, indent_of(line)) {
            Line::Verbatim => push(line),
            Line::Block { column } => {
                push(line);
                while i < lines.len() && (lines[i].trim().is_empty() || indent_of(lines[i]) > column) {
                    push(lines[i]);
                    i += 1;
                }
            }
            Line::Opaque { column } => {
                push(line);
                let end = continuation_end(&lines, i, column);
                for continued in &lines[i..end] {
                    push(*continued);
                }
                i = end;
            }
            Line::Scalar { lead, value, column } => {
                if let Some(quote) = unclosed_quote(value) {
                    push(line);
                    while i < lines.len() {
                        push(lines[i]);
                        i += 1;
                        if find_quote_end(lines[i - 1], quote).is_some() {
                            break;
                        }
                    }
                    continue;
                }

                let end = continuation_end(&lines, i, column);
                let continued = &lines[i..end];
                i = end;
                if continued.is_empty() {
                    push(&render_entry(&lead, value));
                } else if continued.iter().any(|l| l.trim().is_empty())
                    || matches!(normalize(value), TypedScalar::Passthrough(_))
                {
                    push(line);
                    for l in continued {
                        push(*l);
                    }
                } else {
                    let joined = std::iter::once(value)
                        .chain(continued.iter().map(|l| l.trim()))
                        .collect::<Vec<_>>()
                        .join(" ");
                    push(&render_entry(&lead, &joined));
                }
            }
        }
    }
    out
}

/// The column a block scalar opened on `line` must be indented beyond, if
/// `line` opens one.
pub(crate) fn block_column(line: &str) -> Option<usize> {
    match classify_line(line, indent_of(line)) {
        Line::Block { column } => Some(column),
        _ => None,
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// How one source line takes part in the document.
enum Line<'a> {
    /// Copied through unchanged.
    Verbatim,
    /// Opens a block scalar whose body is indented beyond `column`.
    Block { column: usize },
    /// Opens a flow collection; it and any deeper lines are copied.
    Opaque { column: usize },
    /// Carries a scalar; continuation lines are indented beyond `column`.
    Scalar {
        lead: String,
        value: &'a str,
        column: usize,
    },
}

fn classify_line(line: &str, indent: usize) -> Line<'_> {
    let body = &line[indent..];
    if body.is_empty()
        || body.starts_with('#')
        || body.starts_with('%')
        || body.starts_with("---")
        || body.starts_with("...")
    {
        return Line::Verbatim;
    }

    // peel sequence indicators: "- - key: value"
    let mut column = indent;
    let mut rest = body;
    while let Some(item) = rest.strip_prefix("- ").or_else(|| (rest == "-").then_some("")) {
        let trimmed = item.trim_start();
        column += rest.len() - trimmed.len();
        rest = trimmed;
    }
    let prefix = &line[..column];

    if rest.starts_with('?') || rest.starts_with('{') || rest.starts_with('[') {
        return Line::Opaque { column: indent };
    }

    let (lead, value, parent) = match split_key(rest) {
        Some((key, value)) => (format!("{prefix}{key}:"), value.trim(), column),
        // a bare sequence item
        None if column > indent => (prefix.trim_end().to_string(), rest.trim(), indent),
        None => return Line::Verbatim,
    };
    if value.is_empty() {
        return Line::Verbatim;
    }
    if opens_block(value) {
        return Line::Block { column: parent };
    }
    Line::Scalar {
        lead,
        value,
        column: parent,
    }
}

fn render_entry(lead: &str, value: &str) -> String {
    let typed = normalize(value);
    let rendered = typed.render();
    if rendered.is_empty() {
        lead.to_string()
    } else {
        format!("{lead} {rendered}")
    }
}

/// End (exclusive) of the run of lines from `start` indented beyond
/// `column`. Blank lines inside the run belong to it, trailing ones don't.
fn continuation_end(lines: &[&str], start: usize, column: usize) -> usize {
    let mut end = start;
    for (offset, line) in lines[start..].iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if indent_of(line) <= column || trimmed.starts_with('#') {
            break;
        }
        end = start + offset + 1;
    }
    end
}

/// Split `key: value` (or `key:`) into its key and raw value. Quoted keys
/// may contain `": "`.
fn split_key(rest: &str) -> Option<(&str, &str)> {
    let key_end = match rest.chars().next()? {
        quote @ ('"' | '\'') => closing_quote(rest, quote)? + 1,
        _ => {
            let colon = rest
                .match_indices(':')
                .map(|(i, _)| i)
                .find(|&i| rest[i + 1..].is_empty() || rest[i + 1..].starts_with([' ', '\t']))?;
            return Some((&rest[..colon], &rest[colon + 1..]));
        }
    };
    let after = rest[key_end..].trim_start();
    let value = after.strip_prefix(':')?;
    if !value.is_empty() && !value.starts_with([' ', '\t']) {
        return None;
    }
    Some((&rest[..key_end], value))
}

/// The quote character of a quoted scalar that does not close on its
/// first line.
fn unclosed_quote(value: &str) -> Option<char> {
    let quote = value.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    closing_quote(value, quote).is_none().then_some(quote)
}

/// Index of the quote closing the scalar opened at the start of `s`.
fn closing_quote(s: &str, quote: char) -> Option<usize> {
    find_quote_end(&s[1..], quote).map(|i| i + 1)
}

/// Index of the first unescaped `quote` in `s`.
fn find_quote_end(s: &str, quote: char) -> Option<usize> {
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if quote == '"' && c == '\\' {
            chars.next();
        } else if c == quote {
            if quote == '\'' && matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                continue;
            }
            return Some(i);
        }
    }
    None
}
