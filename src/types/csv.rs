//! Flat string encodings for list values.
//!
//! List parameters arrive as a single CSV line (`a,"b,c",d`). Lists stored
//! as flat strings use `;` as delimiter with backslash escaping (`a;b\;c`).

use std::fmt;

/// Why a CSV parameter could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvError {
    MultipleLines,
    UnterminatedQuote,
    /// A quoted field was followed by something other than a delimiter.
    TrailingCharacters,
}

impl fmt::Display for CsvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsvError::MultipleLines => write!(f, "list values must fit on a single line"),
            CsvError::UnterminatedQuote => write!(f, "unterminated quote in list value"),
            CsvError::TrailingCharacters => {
                write!(f, "unexpected characters after a quoted list item")
            }
        }
    }
}

/// Decode one CSV line into its fields.
pub fn parse_line(raw: &str) -> Result<Vec<String>, CsvError> {
    if raw.contains(|c: char| c == '\n' || c == '\r') {
        return Err(CsvError::MultipleLines);
    }

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();
    let mut in_quotes = false;
    let mut after_quote = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    current.push('"');
                }
                '"' => {
                    in_quotes = false;
                    after_quote = true;
                }
                _ => current.push(c),
            }
            continue;
        }

        match c {
            ',' => {
                fields.push(std::mem::take(&mut current));
                after_quote = false;
            }
            _ if after_quote => return Err(CsvError::TrailingCharacters),
            '"' if current.is_empty() => in_quotes = true,
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(CsvError::UnterminatedQuote);
    }
    fields.push(current);
    Ok(fields)
}

/// Whether a CSV parameter contains a field separator outside quotes.
pub fn has_separator(raw: &str) -> bool {
    let mut in_quotes = false;
    for c in raw.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return true,
            _ => {}
        }
    }
    false
}

/// Join items with `;`, escaping embedded delimiters and backslashes.
pub fn join_escaped<S: AsRef<str>>(items: &[S]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        for c in item.as_ref().chars() {
            if c == ';' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
    }
    out
}

/// Split a `;`-delimited string produced by [`join_escaped`].
///
/// Every string holds at least one item; `""` is a single empty item.
pub fn split_escaped(raw: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => current.push('\\'),
            },
            ';' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    items
}
