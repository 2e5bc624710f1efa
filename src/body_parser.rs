//! Tracking of message-body progress over the input buffer

use httparse::InvalidChunkSize;
use tk_bufstream::ReadBuf;

use chunked;

#[derive(Debug, Clone)]
pub enum BodyProgress {
    /// Bytes left of a Content-Length body
    Fixed(usize),
    /// Read until the peer closes (client responses only)
    Eof,
    /// Chunked transfer encoding (client responses only)
    Chunked(chunked::State),
}

impl BodyProgress {
    /// Returns the number of payload bytes available and the "done" flag
    pub fn check_buf<S>(&self, io: &ReadBuf<S>) -> (usize, bool) {
        use self::BodyProgress::*;
        match *self {
            Fixed(x) if x <= io.in_buf.len() => (x, true),
            Fixed(_) => (io.in_buf.len(), false),
            Chunked(ref s) => (s.buffered(), s.is_done()),
            Eof => (io.in_buf.len(), io.done()),
        }
    }
    pub fn parse<S>(&mut self, io: &mut ReadBuf<S>)
        -> Result<(), InvalidChunkSize>
    {
        use self::BodyProgress::*;
        match *self {
            Fixed(_) | Eof => {}
            Chunked(ref mut s) => s.parse(&mut io.in_buf)?,
        }
        Ok(())
    }
    /// Remove consumed payload from both the buffer and the counters
    pub fn consume<S>(&mut self, io: &mut ReadBuf<S>, n: usize) {
        use self::BodyProgress::*;
        io.in_buf.consume(n);
        match *self {
            Fixed(ref mut x) => {
                assert!(*x >= n);
                *x -= n;
            }
            Chunked(ref mut s) => s.consume(n),
            Eof => {}
        }
    }
}
