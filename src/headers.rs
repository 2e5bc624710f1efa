//! Byte-level matching of well-known header tokens
//!
//! Header values arrive as raw bytes. Tokens are compared
//! case-insensitively with surrounding whitespace ignored, without
//! allocating.
#[allow(unused_imports)]
use std::ascii::AsciiExt;


/// Compares a single header-value token against an ascii-lowercase word
pub fn token_is(val: &[u8], token: &str) -> bool {
    let mut val = val;
    while val.len() > 0 &&
        matches!(val[0], b'\r' | b'\n' | b' ' | b'\t')
    {
        val = &val[1..];
    }
    while val.len() > 0 &&
        matches!(val[val.len()-1], b'\r' | b'\n' | b' ' | b'\t')
    {
        val = &val[..val.len()-1];
    }
    if val.len() != token.len() {
        return false;
    }
    val.iter().zip(token.as_bytes().iter())
        .all(|(&a, &b)| a.to_ascii_lowercase() == b)
}

/// True if any comma-separated token of the value matches
pub fn has_token(val: &[u8], token: &str) -> bool {
    val.split(|&x| x == b',').any(|t| token_is(t, token))
}

pub fn is_close(val: &[u8]) -> bool {
    token_is(val, "close")
}

pub fn is_chunked(val: &[u8]) -> bool {
    token_is(val, "chunked")
}

pub fn is_websocket(val: &[u8]) -> bool {
    token_is(val, "websocket")
}

#[cfg(test)]
mod test {
    use super::{token_is, has_token, is_chunked, is_close};

    #[test]
    fn test_chunked() {
        assert!(is_chunked(b"chunked"));
        assert!(is_chunked(b"Chunked"));
        assert!(is_chunked(b"CHUNKED"));
        assert!(is_chunked(b"   CHUNKED"));
        assert!(is_chunked(b"   chunked  "));
        assert!(!is_chunked(b"chunked 1"));
        assert!(!is_chunked(b"xchunked"));
        assert!(!is_chunked(b"chunke"));
    }

    #[test]
    fn test_close() {
        assert!(is_close(b"close"));
        assert!(is_close(b"clOSE"));
        assert!(is_close(b" CLOSE "));
        assert!(!is_close(b"Close 1"));
        assert!(!is_close(b" xclose "));
    }

    #[test]
    fn test_keep_alive() {
        assert!(token_is(b"keep-alive", "keep-alive"));
        assert!(token_is(b"Keep-Alive", "keep-alive"));
        assert!(token_is(b"  KEEP-ALIVE  ", "keep-alive"));
        assert!(!token_is(b"keepalive", "keep-alive"));
    }

    #[test]
    fn test_comma_list() {
        assert!(has_token(b"keep-alive, Upgrade", "upgrade"));
        assert!(has_token(b"Upgrade,keep-alive", "upgrade"));
        assert!(!has_token(b"keep-alive", "upgrade"));
    }

    #[test]
    fn test_empty() {
        assert!(!token_is(b"", "close"));
        assert!(!token_is(b"   ", "close"));
    }
}
