use std::io;
use std::fmt::Display;

use futures::{Future, Async, Poll};
use tk_bufstream::WriteBuf;
use tokio_io::AsyncWrite;

use message::{MessageState, Body, Close, HeaderError};
use enums::{Version, Status};
use server::headers::Head;


/// The response writer handed to a `Codec`
///
/// Its methods keep the bytes in the output buffer consistent with the
/// protocol; anything written is flushed by the connection as soon as
/// the event loop gets around to it.
pub struct Encoder<S> {
    state: MessageState,
    io: WriteBuf<S>,
}

/// Continuation returned from `Encoder::done`
///
/// Return it from the response future to give the connection its write
/// half back.
pub struct EncoderDone<S> {
    buf: WriteBuf<S>,
}

/// Everything needed to serialize a response to one request correctly
#[derive(Debug, Clone, Copy)]
pub struct ResponseConfig {
    /// Request was HEAD, so the body bytes are suppressed
    pub is_head: bool,
    /// `Connection: close` was requested or implied
    pub do_close: bool,
    /// Version of the request
    pub version: Version,
}

/// Future yielding the `Encoder` back once the buffer drains
///
/// Created by `Encoder::wait_flush(watermark)`; used for backpressure
/// when generating long chunked responses.
pub struct WaitFlush<S>(Option<Encoder<S>>, usize);

impl ResponseConfig {
    pub fn from(req: &Head) -> ResponseConfig {
        ResponseConfig {
            version: req.version(),
            is_head: req.method() == "HEAD",
            do_close: req.connection_close(),
        }
    }
}

impl<S> Encoder<S> {
    /// Write the status line from the `Status` enum
    ///
    /// # Panics
    ///
    /// When the status line is already written, or on `Status::Continue`
    /// (100 is not a final status).
    pub fn status(&mut self, status: Status) {
        self.state.response_status(&mut self.io.out_buf,
            status.code(), status.reason())
    }
    /// Write a custom status line
    ///
    /// # Panics
    ///
    /// Same as `status()`.
    pub fn custom_status(&mut self, code: u16, reason: &str) {
        self.state.response_status(&mut self.io.out_buf, code, reason)
    }
    /// Add a header
    ///
    /// `Content-Length` and `Transfer-Encoding` must go through
    /// `add_length`/`add_chunked`, these two headers frame the body and
    /// getting them wrong is a protocol (and security) matter.
    ///
    /// The `Result` exists for proxies; in an application handler it's
    /// fine to unwrap and get a meaningful panic.
    ///
    /// # Panics
    ///
    /// When called in the wrong state.
    pub fn add_header<V: AsRef<[u8]>>(&mut self, name: &str, value: V)
        -> Result<(), HeaderError>
    {
        self.state.add_header(&mut self.io.out_buf, name, value.as_ref())
    }
    /// Same as `add_header` but formats the value into the buffer
    pub fn format_header<D: Display>(&mut self, name: &str, value: D)
        -> Result<(), HeaderError>
    {
        self.state.format_header(&mut self.io.out_buf, name, value)
    }
    /// Add a `Content-Length` header
    ///
    /// # Panics
    ///
    /// When called in the wrong state.
    pub fn add_length(&mut self, n: u64) -> Result<(), HeaderError> {
        self.state.add_length(&mut self.io.out_buf, n)
    }
    /// Add a `Transfer-Encoding: chunked` header
    ///
    /// # Panics
    ///
    /// When called in the wrong state.
    pub fn add_chunked(&mut self) -> Result<(), HeaderError> {
        self.state.add_chunked(&mut self.io.out_buf)
    }
    /// Add a `Date` header with the current time
    #[cfg(feature="date_header")]
    pub fn add_date(&mut self) {
        use httpdate::HttpDate;
        use std::time::SystemTime;
        self.format_header("Date", HttpDate::from(SystemTime::now()))
            .expect("a date is always a valid header")
    }
    /// True once the status line is written
    ///
    /// When false it's still possible to replace the response with an
    /// error page.
    pub fn is_started(&self) -> bool {
        self.state.is_started()
    }
    /// Finish the headers; returns true if a body is expected
    ///
    /// `false` for 1xx/204/304 and responses to HEAD.
    ///
    /// # Panics
    ///
    /// When called in the wrong state.
    pub fn done_headers(&mut self) -> Result<bool, HeaderError> {
        self.state.done_headers(&mut self.io.out_buf)
    }
    /// Write a piece of the body (fixed-length or chunked)
    ///
    /// # Panics
    ///
    /// When called before the headers are finished, or when a fixed
    /// body overflows its declared length.
    pub fn write_body(&mut self, data: &[u8]) {
        self.state.write_body(&mut self.io.out_buf, data)
    }
    /// True once `done()` was called
    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }
    /// Finish the response
    ///
    /// # Panics
    ///
    /// When the body is incomplete.
    pub fn done(mut self) -> EncoderDone<S> {
        self.state.done(&mut self.io.out_buf);
        EncoderDone { buf: self.io }
    }
    /// Flush buffered bytes to the socket
    ///
    /// Schedules a wakeup if the socket isn't ready for all of them.
    pub fn flush(&mut self) -> Result<(), io::Error>
        where S: AsyncWrite
    {
        self.io.flush()
    }
    /// Number of response bytes not yet handed to the kernel
    pub fn bytes_buffered(&self) -> usize {
        self.io.out_buf.len()
    }
    /// A future yielding the encoder back when `bytes_buffered()` drops
    /// below `watermark`
    pub fn wait_flush(self, watermark: usize) -> WaitFlush<S> {
        WaitFlush(Some(self), watermark)
    }
}

impl<S> io::Write for Encoder<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: AsyncWrite> Future for WaitFlush<S> {
    type Item = Encoder<S>;
    type Error = io::Error;
    fn poll(&mut self) -> Poll<Encoder<S>, io::Error> {
        let bytes_left = {
            let enc = self.0.as_mut().expect("future polled after ready");
            enc.flush()?;
            enc.io.out_buf.len()
        };
        if bytes_left < self.1 {
            Ok(Async::Ready(self.0.take().unwrap()))
        } else {
            Ok(Async::NotReady)
        }
    }
}

pub fn get_inner<S>(e: EncoderDone<S>) -> WriteBuf<S> {
    e.buf
}

pub fn new<S>(io: WriteBuf<S>, cfg: ResponseConfig) -> Encoder<S> {
    Encoder {
        state: MessageState::ResponseStart {
            body: if cfg.is_head { Body::Head } else { Body::Normal },
            version: cfg.version,
            // a 1.0 peer that negotiated keep-alive needs to hear it back
            close: if cfg.do_close {
                Close::Close
            } else if cfg.version == Version::Http10 {
                Close::KeepAlive
            } else {
                Close::Default
            },
        },
        io: io,
    }
}
