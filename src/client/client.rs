use futures::{Async, Future};

use client::{Error, Encoder, EncoderDone, Head};


/// Framing of the response body, as determined by the head
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BodyKind {
    Fixed(u64),
    Chunked,
    Eof,
}

/// How the codec wants the response body delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvMode {
    /// Buffer the whole body (up to the limit) before the single
    /// `data_received` call
    ///
    /// Works the same for fixed-length, chunked and read-until-EOF
    /// responses; the argument is an upper bound, not a buffer size.
    Buffered(usize),
    /// Deliver the body in pieces as they arrive
    ///
    /// The parameter is the minimum number of bytes worth waking the
    /// codec for; `Progressive(1)` is perfectly fine.
    Progressive(usize),
}

/// One request-response exchange over a client connection
///
/// The codec is pushed into a `Proto` sink; it writes the request and
/// then receives the response through the callbacks below.
pub trait Codec<S> {
    /// Future writing the request; resolves once it's fully buffered
    type Future: Future<Item=EncoderDone<S>, Error=Error>;

    /// Write the request line, headers and body
    fn start_write(&mut self, e: Encoder<S>) -> Self::Future;

    /// Response headers arrived
    fn headers_received(&mut self, headers: &Head)
        -> Result<RecvMode, Error>;

    /// A piece of the response body
    ///
    /// `end` is true on the last piece. Returns the number of bytes
    /// consumed; unconsumed bytes are offered again. `NotReady` pauses
    /// delivery until the codec wakes the task itself.
    fn data_received(&mut self, data: &[u8], end: bool)
        -> Result<Async<usize>, Error>;
}
