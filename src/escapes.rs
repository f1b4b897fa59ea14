//! Terminfo literal escapes: `\E`, `\ddd`, `^X` control notation, and the
//! punctuation escapes. Shared by the string compiler and the numeric
//! character-constant parser.

/// Decode the escape (or plain byte) at the front of `input`. Returns the
/// produced byte, or `None` for unsupported escapes (which emit nothing),
/// plus the number of bytes consumed.
pub(crate) fn decode(input: &[u8]) -> (Option<u8>, usize) {
    match input.first() {
        None => (None, 0),
        Some(b'\\') => decode_backslash(input),
        Some(b'^') => decode_caret(input),
        Some(&b) => (Some(b), 1),
    }
}

/// Decode a whole string, dropping unsupported escapes.
pub(crate) fn unescape(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let (byte, used) = decode(&bytes[i..]);
        if let Some(byte) = byte {
            out.push(byte);
        }
        i += used;
    }
    out
}

fn decode_backslash(input: &[u8]) -> (Option<u8>, usize) {
    let byte = match input.get(1) {
        None => {
            log::warn!("dangling `\\` at end of capability string");
            return (None, 1);
        }
        Some(&b) => b,
    };
    let decoded = match byte {
        b'E' | b'e' => 0x1B,
        b'n' | b'l' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'b' => 0x08,
        b'f' => 0x0C,
        b's' => b' ',
        b'^' | b'\\' | b',' | b':' => byte,
        b'0'..=b'7' => {
            let mut value: u32 = 0;
            let mut used = 1;
            while used < 4 {
                match input.get(used) {
                    Some(&d @ b'0'..=b'7') => {
                        value = value * 8 + u32::from(d - b'0');
                        used += 1;
                    }
                    _ => break,
                }
            }
            // all-zero octal is the historical "not NUL" convention
            let byte = if value == 0 { 0x80 } else { value as u8 };
            return (Some(byte), used);
        }
        other => {
            log::warn!("unsupported escape `\\{}`", char::from(other));
            return (None, 2);
        }
    };
    (Some(decoded), 2)
}

fn decode_caret(input: &[u8]) -> (Option<u8>, usize) {
    let byte = match input.get(1) {
        None => {
            log::warn!("dangling `^` at end of capability string");
            return (None, 1);
        }
        Some(&b) => b,
    };
    match byte {
        b'?' => (Some(0x7F), 2),
        b'@' | b'A'..=b'Z' | b'[' | b'\\' | b']' | b'^' | b'_' => (Some(byte & 0x1F), 2),
        other => {
            log::warn!("unsupported control notation `^{}`", char::from(other));
            (None, 2)
        }
    }
}
