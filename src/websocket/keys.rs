//! Handshake key values: `Sec-WebSocket-Key` and `Sec-WebSocket-Accept`

use std::fmt;
use std::str::from_utf8_unchecked;

use rand::{Rng, thread_rng};
use sha1::Sha1;


/// GUID the accept value is derived with (fixed by RFC 6455)
pub const GUID: &'static str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

const BASE64: &'static [u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                                abcdefghijklmnopqrstuvwxyz\
                                0123456789+/";

/// The `Sec-WebSocket-Accept` header value
///
/// Formats itself base64-encoded, so it can be added with
/// `format_header("Sec-WebSocket-Accept", accept)`.
pub struct Accept([u8; 20]);

/// The `Sec-WebSocket-Key` header value
///
/// Formats itself base64-encoded, like `Accept`.
pub struct Key([u8; 16]);

impl Key {
    /// A fresh random key for a client handshake
    pub fn new() -> Key {
        let mut key = [0u8; 16];
        thread_rng().fill_bytes(&mut key);
        Key(key)
    }
}

impl Accept {
    /// Compute the accept value from the base64 key as it appeared on
    /// the wire
    ///
    /// The key is not validated; the RFC doesn't require that.
    pub fn from_key_bytes(key: &[u8]) -> Accept {
        let mut sha1 = Sha1::new();
        sha1.update(key);
        sha1.update(GUID.as_bytes());
        Accept(sha1.digest().bytes())
    }
}

impl fmt::Display for Accept {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // 20 bytes: six full base64 groups and a 2-byte tail
        let mut buf = [0u8; 28];
        for i in 0..6 {
            let n = ((self.0[i*3+0] as usize) << 16) |
                    ((self.0[i*3+1] as usize) <<  8) |
                     (self.0[i*3+2] as usize);
            buf[i*4+0] = BASE64[(n >> 18) & 63];
            buf[i*4+1] = BASE64[(n >> 12) & 63];
            buf[i*4+2] = BASE64[(n >>  6) & 63];
            buf[i*4+3] = BASE64[(n >>  0) & 63];
        }
        let n = ((self.0[18] as usize) << 16) |
                ((self.0[19] as usize) <<  8);
        buf[24] = BASE64[(n >> 18) & 63];
        buf[25] = BASE64[(n >> 12) & 63];
        buf[26] = BASE64[(n >> 6) & 63];
        buf[27] = b'=';
        fmt::Write::write_str(f, unsafe { from_utf8_unchecked(&buf) })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // 16 bytes: five full base64 groups and a 1-byte tail
        let mut buf = [0u8; 24];
        for i in 0..5 {
            let n = ((self.0[i*3+0] as usize) << 16) |
                    ((self.0[i*3+1] as usize) <<  8) |
                     (self.0[i*3+2] as usize);
            buf[i*4+0] = BASE64[(n >> 18) & 63];
            buf[i*4+1] = BASE64[(n >> 12) & 63];
            buf[i*4+2] = BASE64[(n >>  6) & 63];
            buf[i*4+3] = BASE64[(n >>  0) & 63];
        }
        let n = (self.0[15] as usize) << 16;
        buf[20] = BASE64[(n >> 18) & 63];
        buf[21] = BASE64[(n >> 12) & 63];
        buf[22] = b'=';
        buf[23] = b'=';
        fmt::Write::write_str(f, unsafe { from_utf8_unchecked(&buf) })
    }
}

impl fmt::Debug for Accept {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "websocket::Accept({})", self)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "websocket::Key({})", self)
    }
}

#[cfg(test)]
mod test {
    use super::Accept;

    #[test]
    fn rfc_example() {
        // the worked example of RFC 6455 §1.3
        let accept = Accept::from_key_bytes(b"dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(format!("{}", accept), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }
}
