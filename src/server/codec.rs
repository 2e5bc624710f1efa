use futures::{Async, Future};
use tk_bufstream::{ReadBuf, WriteBuf};

use server::{Error, Encoder, EncoderDone, Head, RecvMode};


/// Framing of the request body, as determined by the head
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BodyKind {
    Fixed(u64),
    Chunked,
}

/// The per-connection half of the server seam
///
/// One dispatcher exists for every accepted connection and hands out a
/// fresh codec for every request arriving on it.
pub trait Dispatcher<S> {
    type Codec: Codec<S>;

    /// A complete request head was parsed
    ///
    /// Anything needed from the borrowed `Head` must be copied out here;
    /// the underlying buffer is reused for the body.
    fn headers_received(&mut self, headers: &Head)
        -> Result<Self::Codec, Error>;
}

/// The per-request half of the server seam
pub trait Codec<S> {
    /// Future writing the response; resolves when the message is done
    type ResponseFuture: Future<Item=EncoderDone<S>, Error=Error>;

    /// How to deliver the request body; called once after
    /// `headers_received`
    fn recv_mode(&mut self) -> RecvMode;

    /// A piece of the request body
    ///
    /// `end` is true on the last piece (buffered-upfront codecs get the
    /// whole body in one call with `end == true`). The return value is
    /// the number of bytes consumed; unconsumed bytes are offered again.
    /// `NotReady` pauses body delivery until the codec wakes the task.
    fn data_received(&mut self, data: &[u8], end: bool)
        -> Result<Async<usize>, Error>;

    /// Start writing the response
    ///
    /// Called once the body is fully delivered (or immediately for
    /// bodyless and hijacked requests). The returned future owns the
    /// write half until it resolves; a handler that needs to respond
    /// asynchronously just takes its time here.
    fn start_response(&mut self, e: Encoder<S>) -> Self::ResponseFuture;

    /// Take over the connection after an upgrade response
    ///
    /// Called instead of keep-alive handling when `recv_mode` was
    /// `Hijack` and the response (usually a 101) has been written.
    fn hijack(&mut self, _write_buf: WriteBuf<S>, _read_buf: ReadBuf<S>) {
        panic!("this codec never asks for a hijack");
    }
}
