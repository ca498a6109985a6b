//! Newline escaping for streamed payloads.
//!
//! The stdout transport delivers one message per line, so a payload that
//! contains `\n` or `\r` would be split (or silently swallowed) by the
//! framing. Payloads are therefore escaped to literal two-character
//! sequences before they hit the wire and unescaped by the receiver.
//!
//! Backslash itself is escaped first so that the round trip is lossless for
//! any input, including text that already contains a literal `\n` sequence.

/// Escape a payload for the line-oriented transport.
pub fn escape_payload(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_payload`]. Unknown escape sequences are preserved
/// verbatim so that a buggy sender cannot make the receiver drop bytes.
pub fn unescape_payload(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
