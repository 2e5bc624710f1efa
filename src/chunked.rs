//! Incremental decoder for chunked transfer encoding
//!
//! Only the client reads chunked bodies; the server rejects them on the
//! request path. Chunk framing is stripped from the buffer in place, so
//! the first `buffered()` bytes of the buffer are always payload.

use httparse::{InvalidChunkSize, parse_chunk_size};
use tk_bufstream::Buf;


#[derive(Debug, Clone)]
pub struct State {
    buffered: usize,
    pending: usize,
    done: bool,
}

impl State {
    pub fn new() -> State {
        State {
            buffered: 0,
            pending: 0,
            done: false,
        }
    }
    /// Consume chunk headers from `buf`, leaving decoded payload in place
    pub fn parse(&mut self, buf: &mut Buf) -> Result<(), InvalidChunkSize> {
        let State { ref mut buffered, ref mut pending, ref mut done } = *self;
        if *done {
            // trailing bytes after the last chunk are ignored
            return Ok(());
        }
        while *buffered < buf.len() {
            if *pending == 0 {
                use httparse::Status::*;
                match parse_chunk_size(&buf[*buffered..])? {
                    Complete((bytes, 0)) => {
                        buf.remove_range(*buffered..*buffered+bytes);
                        *done = true;
                        return Ok(());
                    }
                    Complete((bytes, chunk_size)) => {
                        buf.remove_range(*buffered..*buffered+bytes);
                        *pending = chunk_size as usize;
                    }
                    Partial => {
                        return Ok(());
                    }
                }
            } else {
                if *buffered + *pending <= buf.len() {
                    *buffered += *pending;
                    *pending = 0;
                } else {
                    *pending -= buf.len() - *buffered;
                    *buffered = buf.len();
                }
            }
        }
        Ok(())
    }
    pub fn buffered(&self) -> usize {
        self.buffered
    }
    pub fn is_done(&self) -> bool {
        self.done
    }
    pub fn consume(&mut self, n: usize) {
        assert!(self.buffered >= n);
        self.buffered -= n;
    }
}

#[cfg(test)]
mod test {
    use tk_bufstream::Buf;
    use super::State;

    #[test]
    fn single_chunk() {
        let mut buf = Buf::new();
        buf.extend(b"5\r\nhello\r\n0\r\n\r\n");
        let mut state = State::new();
        state.parse(&mut buf).unwrap();
        assert_eq!(state.buffered(), 5);
        assert!(state.is_done());
        assert_eq!(&buf[..5], b"hello");
    }

    #[test]
    fn split_across_reads() {
        // the chunk header, data and terminator may arrive byte by byte
        let data = b"5\r\nhello\r\n3\r\nfoo\r\n0\r\n\r\n";
        for cut in 1..data.len() {
            let mut buf = Buf::new();
            let mut state = State::new();
            buf.extend(&data[..cut]);
            state.parse(&mut buf).unwrap();
            buf.extend(&data[cut..]);
            state.parse(&mut buf).unwrap();
            assert!(state.is_done(), "cut at {}", cut);
            assert_eq!(state.buffered(), 8, "cut at {}", cut);
            assert_eq!(&buf[..8], b"hellofoo", "cut at {}", cut);
        }
    }

    #[test]
    fn trailing_bytes_ignored() {
        let mut buf = Buf::new();
        buf.extend(b"2\r\nhi\r\n0\r\n\r\njunk");
        let mut state = State::new();
        state.parse(&mut buf).unwrap();
        assert!(state.is_done());
        assert_eq!(state.buffered(), 2);
    }

    #[test]
    fn consume_progress() {
        let mut buf = Buf::new();
        buf.extend(b"3\r\nabc\r\n");
        let mut state = State::new();
        state.parse(&mut buf).unwrap();
        assert_eq!(state.buffered(), 3);
        assert!(!state.is_done());
        buf.consume(3);
        state.consume(3);
        assert_eq!(state.buffered(), 0);
    }

    #[test]
    fn bad_chunk_size() {
        let mut buf = Buf::new();
        buf.extend(b"zz\r\nhello");
        let mut state = State::new();
        assert!(state.parse(&mut buf).is_err());
    }
}
