use nom::{branch::alt, combinator::opt, error::ParseError, IResult};

use crate::tokens::{Token, TokenKind};
use crate::Int;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    NotFound,
    IllegalCharacter { line: usize, found: char },
    MissingComma { line: usize },
    InvalidFeature { line: usize, text: String },
    Internal { kind: nom::error::ErrorKind },
}

impl TokenizeError {
    fn not_found() -> nom::Err<TokenizeError> {
        nom::Err::Error(TokenizeError::NotFound)
    }
}

impl<'a> ParseError<&'a str> for TokenizeError {
    fn from_error_kind(_input: &'a str, kind: nom::error::ErrorKind) -> Self {
        TokenizeError::Internal { kind }
    }

    fn append(_input: &'a str, kind: nom::error::ErrorKind, _: Self) -> Self {
        TokenizeError::Internal { kind }
    }
}

impl std::fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "no token matched"),
            Self::IllegalCharacter { line, found } => {
                write!(f, "line {}: illegal character {:?}", line, found)
            }
            Self::MissingComma { line } => {
                write!(f, "line {}: missing terminating `,`", line)
            }
            Self::InvalidFeature { line, text } => {
                write!(f, "line {}: `{}` is not a valid capability", line, text)
            }
            Self::Internal { kind } => write!(f, "internal lexer error: {:?}", kind),
        }
    }
}

/// Tokenize a terminfo source buffer.
///
/// The scanner is line-oriented: blank lines and lines whose first non-blank
/// character is `#` are discarded, a line starting at column 0 opens an entry
/// header, and a line starting with whitespace continues the current entry's
/// feature list. Within a line, candidate tokens are tried in a fixed
/// priority order (longname before alias, numeric and string before
/// boolean), which keeps the grammar single-valued.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, TokenizeError> {
    let mut tokens = Vec::new();
    for (idx, text) in input.lines().enumerate() {
        scan_line(text, idx + 1, &mut tokens)?;
    }
    Ok(tokens)
}

fn scan_line<'a>(
    text: &'a str,
    line: usize,
    out: &mut Vec<Token<'a>>,
) -> Result<(), TokenizeError> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Ok(());
    }
    if trimmed.starts_with('#') {
        out.push(Token::new(TokenKind::Comment, trimmed, line));
        return Ok(());
    }
    if text.starts_with(char::is_whitespace) {
        scan_features(text, line, out)
    } else {
        scan_header(text, line, out)
    }
}

fn scan_header<'a>(
    text: &'a str,
    line: usize,
    out: &mut Vec<Token<'a>>,
) -> Result<(), TokenizeError> {
    let (mut rest, first) = alias(text).map_err(|_| illegal(text, line))?;
    out.push(Token::new(TokenKind::AliasInColumnOne, first, line));

    loop {
        if let Some(after) = rest.strip_prefix('|') {
            out.push(Token::new(TokenKind::Pipe, "|", line));
            // Longname is tried before alias: the final field runs to the
            // line's closing comma and may itself contain commas.
            if let Some((after, name)) = longname(after) {
                out.push(Token::new(TokenKind::Longname, name, line));
                rest = after;
            } else {
                let (after, name) = alias(after).map_err(|_| illegal(after, line))?;
                out.push(Token::new(TokenKind::Alias, name, line));
                rest = after;
            }
        } else if let Some(after) = rest.strip_prefix(',') {
            out.push(Token::new(TokenKind::Comma, ",", line));
            if !after.trim().is_empty() {
                return Err(illegal(after.trim_start(), line));
            }
            out.push(Token::new(TokenKind::Newline, "\n", line));
            return Ok(());
        } else if rest.is_empty() {
            return Err(TokenizeError::MissingComma { line });
        } else {
            return Err(illegal(rest, line));
        }
    }
}

fn scan_features<'a>(
    text: &'a str,
    line: usize,
    out: &mut Vec<Token<'a>>,
) -> Result<(), TokenizeError> {
    let ws_len = text.len() - text.trim_start().len();
    out.push(Token::new(TokenKind::Whitespace, &text[..ws_len], line));

    let mut rest = &text[ws_len..];
    while !rest.trim().is_empty() {
        let (chunk, after) =
            split_feature(rest).ok_or(TokenizeError::MissingComma { line })?;
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            let kind = feature(chunk)
                .ok()
                .filter(|(left, _)| left.is_empty())
                .map(|(_, kind)| kind)
                .ok_or_else(|| TokenizeError::InvalidFeature {
                    line,
                    text: chunk.to_string(),
                })?;
            out.push(Token::new(kind, chunk, line));
        }
        out.push(Token::new(TokenKind::Comma, ",", line));
        rest = after;
    }
    out.push(Token::new(TokenKind::Newline, "\n", line));
    Ok(())
}

/// Split off the text before the next unescaped comma. `\,` does not split.
fn split_feature(input: &str) -> Option<(&str, &str)> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b',' => return Some((&input[..i], &input[i + 1..])),
            _ => i += 1,
        }
    }
    None
}

fn illegal(rest: &str, line: usize) -> TokenizeError {
    TokenizeError::IllegalCharacter {
        line,
        found: rest.chars().next().unwrap_or('\n'),
    }
}

fn alias(input: &str) -> IResult<&str, &str, TokenizeError> {
    let len = input
        .chars()
        .take_while(|&c| is_alias_char(c))
        .map(char::len_utf8)
        .sum();
    if len == 0 {
        return Err(TokenizeError::not_found());
    }
    Ok((&input[len..], &input[..len]))
}

/// Match a final header field: a maximal run of printable characters
/// excluding `|`, anchored by lookahead to the line's closing comma. Returns
/// the remaining input positioned on that comma.
fn longname(input: &str) -> Option<(&str, &str)> {
    let len = input
        .chars()
        .take_while(|&c| is_longname_char(c))
        .map(char::len_utf8)
        .sum::<usize>();
    if len == 0 || len < input.len() {
        // the run stopped at a `|` (or a control character): not a final field
        return None;
    }
    let run = &input[..len];
    let comma = run.rfind(',')?;
    if comma == 0 || !run[comma + 1..].trim().is_empty() {
        return None;
    }
    Some((&input[comma..], &run[..comma]))
}

fn feature(input: &str) -> IResult<&str, TokenKind, TokenizeError> {
    alt((numeric, string_feature, boolean))(input)
}

fn numeric(input: &str) -> IResult<&str, TokenKind, TokenizeError> {
    let (rest, _) = cap_name(input)?;
    let (rest, _) = lit('#')(rest)?;
    let (rest, _) = c_integer(rest)?;
    if !rest.is_empty() {
        return Err(TokenizeError::not_found());
    }
    Ok((rest, TokenKind::Numeric))
}

fn string_feature(input: &str) -> IResult<&str, TokenKind, TokenizeError> {
    let (rest, _) = cap_name(input)?;
    let (_, _) = lit('=')(rest)?;
    // the raw value is everything after `=`; escapes stay verbatim
    Ok(("", TokenKind::String))
}

fn boolean(input: &str) -> IResult<&str, TokenKind, TokenizeError> {
    let (rest, _) = cap_name(input)?;
    if !rest.is_empty() {
        return Err(TokenizeError::not_found());
    }
    Ok((rest, TokenKind::Boolean))
}

fn cap_name(input: &str) -> IResult<&str, &str, TokenizeError> {
    let len = input
        .chars()
        .take_while(|&c| is_cap_name_char(c))
        .map(char::len_utf8)
        .sum();
    if len == 0 {
        return Err(TokenizeError::not_found());
    }
    Ok((&input[len..], &input[..len]))
}

/// Parse a C-style integer constant: hex, octal, decimal, or a quoted
/// character literal, with an optional `u`/`U`/`l`/`L` suffix run.
pub(crate) fn c_integer(input: &str) -> IResult<&str, Int, TokenizeError> {
    let (rest, value) = alt((hex_constant, char_constant, octal_constant, decimal_constant))(input)?;
    let (rest, _) = opt(integer_suffix)(rest)?;
    Ok((rest, value))
}

fn hex_constant(input: &str) -> IResult<&str, Int, TokenizeError> {
    let rest = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .ok_or_else(TokenizeError::not_found)?;
    let len = rest.chars().take_while(char::is_ascii_hexdigit).count();
    if len == 0 {
        return Err(TokenizeError::not_found());
    }
    let value = Int::from_str_radix(&rest[..len], 16).map_err(|_| TokenizeError::not_found())?;
    Ok((&rest[len..], value))
}

fn octal_constant(input: &str) -> IResult<&str, Int, TokenizeError> {
    if !input.starts_with('0') {
        return Err(TokenizeError::not_found());
    }
    let len = input.chars().take_while(|c| ('0'..='7').contains(c)).count();
    let value = Int::from_str_radix(&input[..len], 8).map_err(|_| TokenizeError::not_found())?;
    Ok((&input[len..], value))
}

fn decimal_constant(input: &str) -> IResult<&str, Int, TokenizeError> {
    let len = input.chars().take_while(char::is_ascii_digit).count();
    if len == 0 {
        return Err(TokenizeError::not_found());
    }
    let value = input[..len].parse::<Int>().map_err(|_| TokenizeError::not_found())?;
    Ok((&input[len..], value))
}

fn char_constant(input: &str) -> IResult<&str, Int, TokenizeError> {
    let rest = input.strip_prefix('\'').ok_or_else(TokenizeError::not_found)?;
    let close = rest.find('\'').ok_or_else(TokenizeError::not_found)?;
    let decoded = crate::escapes::unescape(&rest[..close]);
    let value = *decoded.first().ok_or_else(TokenizeError::not_found)?;
    Ok((&rest[close + 1..], Int::from(value)))
}

fn integer_suffix(input: &str) -> IResult<&str, &str, TokenizeError> {
    let len = input
        .chars()
        .take_while(|&c| matches!(c, 'u' | 'U' | 'l' | 'L'))
        .count();
    if len == 0 {
        return Err(TokenizeError::not_found());
    }
    Ok((&input[len..], &input[..len]))
}

fn lit(c: char) -> impl Fn(&str) -> IResult<&str, char, TokenizeError> {
    move |input: &str| match input.strip_prefix(c) {
        Some(rest) => Ok((rest, c)),
        None => Err(TokenizeError::not_found()),
    }
}

/// Graphic: printable and not a space.
fn is_graphic(c: char) -> bool {
    !c.is_whitespace() && !c.is_control()
}

fn is_alias_char(c: char) -> bool {
    is_graphic(c) && !matches!(c, ',' | '/' | '|')
}

fn is_longname_char(c: char) -> bool {
    !c.is_control() && c != '|'
}

fn is_cap_name_char(c: char) -> bool {
    is_graphic(c) && !matches!(c, ',' | '=' | '#')
}
