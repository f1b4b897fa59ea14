use crate::tokenizer::{c_integer, tokenize, TokenizeError};
use crate::{CapValue, Capability, Database, Entry, Error, TokenKind};

use core::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyntaxError {
    Tokenize(TokenizeError),
    /// A feature line appeared before any entry header.
    MissingHeader { line: usize },
    DuplicateAlias { line: usize, alias: String },
    InvalidNumber { line: usize, text: String },
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Tokenize(err) => write!(f, "{}", err),
            Self::MissingHeader { line } => {
                write!(f, "line {}: capability outside of any entry", line)
            }
            Self::DuplicateAlias { line, alias } => {
                write!(f, "line {}: alias \"{}\" repeated within one entry", line, alias)
            }
            Self::InvalidNumber { line, text } => {
                write!(f, "line {}: `{}` is not a numeric capability", line, text)
            }
        }
    }
}

impl From<TokenizeError> for SyntaxError {
    fn from(err: TokenizeError) -> Self {
        Self::Tokenize(err)
    }
}

/// Parse a terminfo source buffer into a [`Database`].
///
/// Capability values are kept raw: escape expansion and `%`-compilation are
/// deferred until a string is actually used, and `use=` references survive as
/// ordinary string capabilities until resolution.
pub fn parse_database(input: &str) -> Result<Database, Error> {
    let tokens = tokenize(input).map_err(SyntaxError::from)?;

    let mut entries: Vec<Entry> = Vec::new();
    let mut current: Option<Entry> = None;

    let significant = tokens.iter().filter(|t| {
        !matches!(
            t.kind,
            TokenKind::Whitespace
                | TokenKind::Comment
                | TokenKind::Newline
                | TokenKind::Comma
                | TokenKind::Pipe
        )
    });

    for token in significant {
        match token.kind {
            TokenKind::AliasInColumnOne => {
                if let Some(entry) = current.take() {
                    entries.push(entry);
                }
                current = Some(Entry::named(token.text));
            }
            TokenKind::Alias => {
                let entry = expect_entry(&mut current, token.line)?;
                if entry.aliases.iter().any(|a| a == token.text) {
                    return Err(SyntaxError::DuplicateAlias {
                        line: token.line,
                        alias: token.text.to_string(),
                    }
                    .into());
                }
                entry.aliases.push(token.text.to_string());
            }
            TokenKind::Longname => {
                let entry = expect_entry(&mut current, token.line)?;
                entry.longname = Some(token.text.to_string());
            }
            TokenKind::Boolean => {
                let entry = expect_entry(&mut current, token.line)?;
                // a trailing `@` marks a cancellation; the marker is kept
                // verbatim for the resolver
                let cancelled = token.text.ends_with('@');
                entry.caps.push(Capability {
                    name: token.text.to_string(),
                    value: CapValue::Boolean(!cancelled),
                });
            }
            TokenKind::Numeric => {
                let entry = expect_entry(&mut current, token.line)?;
                let invalid = || SyntaxError::InvalidNumber {
                    line: token.line,
                    text: token.text.to_string(),
                };
                let (name, tail) = token.text.split_once('#').ok_or_else(invalid)?;
                let (_, value) = c_integer(tail).map_err(|_| invalid())?;
                entry.caps.push(Capability {
                    name: name.to_string(),
                    value: CapValue::Numeric(value),
                });
            }
            TokenKind::String => {
                let entry = expect_entry(&mut current, token.line)?;
                let (name, tail) = token.text.split_once('=').unwrap_or((token.text, ""));
                entry.caps.push(Capability {
                    name: name.to_string(),
                    value: CapValue::String(tail.to_string()),
                });
            }
            _ => {}
        }
    }

    if let Some(entry) = current.take() {
        entries.push(entry);
    }

    Ok(Database { entries })
}

fn expect_entry<'a>(
    current: &'a mut Option<Entry>,
    line: usize,
) -> Result<&'a mut Entry, SyntaxError> {
    current.as_mut().ok_or(SyntaxError::MissingHeader { line })
}
